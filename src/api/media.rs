use axum::{
    body::Body,
    extract::Extension,
    http::{header, HeaderMap, HeaderValue},
    response::IntoResponse,
    routing::get,
    Router,
};
use sea_orm::{DatabaseConnection, EntityTrait};
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::warn;

use crate::config::Config;
use crate::entities::product_image;
use crate::error::ApiError;
use crate::extract::Path;

pub fn media_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/media/images/:image_id", get(serve_image))
        .layer(Extension(db))
}

/// Streams a stored product image with a content type guessed from its extension.
pub async fn serve_image(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<Config>>,
) -> Result<impl IntoResponse, ApiError> {
    let model = product_image::Entity::find_by_id(id)
        .one(&*db)
        .await?
        .ok_or_else(ApiError::not_found)?;

    let path = config.media_root.join(model.relative_path());
    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(err) => {
            warn!(image_id = id, path = %path.display(), error = %err, "Image file missing");
            return Err(ApiError::not_found());
        }
    };

    let content_type = mime_guess::from_path(&path)
        .first_raw()
        .unwrap_or("application/octet-stream");

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static("inline"),
    );

    let body = Body::from_stream(ReaderStream::new(file));
    Ok((headers, body))
}
