use axum::{
    extract::{DefaultBodyLimit, Extension, Multipart},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::product::find_product;
use crate::config::Config;
use crate::entities::product_image::{self, FileExtension};
use crate::error::ApiError;
use crate::extract::Path;
use crate::middleware::permissions::{permission_middleware, Permission};

static FILE_NAME_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._-]+$").unwrap());

const IMAGE_FIELD: &str = "image";

//ROUTERS
pub fn product_image_router(db: Arc<DatabaseConnection>, config: Arc<Config>) -> Router {
    // Room for the multipart framing around the file itself.
    let body_limit = config.file_size_limit + 16 * 1024;

    Router::new()
        .route(
            "/products/:product_id/images",
            get(get_images).post(upload_image),
        )
        .route(
            "/products/:product_id/images/:image_id",
            get(get_image).delete(delete_image),
        )
        .route_layer(from_fn_with_state(
            Permission::AdminOrReadOnly,
            permission_middleware,
        ))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(Extension(db))
}

//ROUTES
async fn get_images(
    Path(product_id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    find_product(&*db, product_id).await?;

    let images: Vec<ImageResponse> = product_image::Entity::find()
        .filter(product_image::Column::ProductId.eq(product_id))
        .order_by_asc(product_image::Column::Id)
        .all(&*db)
        .await?
        .into_iter()
        .map(ImageResponse::from)
        .collect();

    Ok(Json(images))
}

async fn upload_image(
    Path(product_id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<Config>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let txn = db.begin().await?;
    find_product(&txn, product_id).await?;

    let field = loop {
        match multipart.next_field().await.map_err(multipart_error)? {
            Some(field) if field.name() == Some(IMAGE_FIELD) => break field,
            Some(_) => continue,
            None => return Err(ApiError::field(IMAGE_FIELD, "No file was submitted.")),
        }
    };

    let extension = field
        .content_type()
        .and_then(FileExtension::from_content_type)
        .ok_or_else(|| {
            ApiError::field(
                IMAGE_FIELD,
                "Upload a valid image. Only JPEG and PNG files are accepted.",
            )
        })?;

    let file_name = field.file_name().unwrap_or(IMAGE_FIELD).to_owned();
    if !FILE_NAME_REGEX.is_match(&file_name) {
        return Err(ApiError::field(
            IMAGE_FIELD,
            "Invalid file name. It should contain only Latin letters, numbers, '.', '-', or '_'.",
        ));
    }

    let data = field.bytes().await.map_err(multipart_error)?;
    if data.len() > config.file_size_limit {
        return Err(ApiError::PayloadTooLarge(format!(
            "File is larger than {} bytes.",
            config.file_size_limit
        )));
    }
    if data.is_empty() {
        return Err(ApiError::field(IMAGE_FIELD, "The submitted file is empty."));
    }

    let model = product_image::ActiveModel {
        product_id: Set(product_id),
        file_name: Set(file_name),
        path_name: Set(Uuid::new_v4().to_string()),
        extension: Set(extension),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let path = config.media_root.join(model.relative_path());
    store_file(&path, &data).await?;

    if let Err(err) = txn.commit().await {
        remove_file(&path).await;
        return Err(err.into());
    }

    info!(product_id, image_id = model.id, bytes = data.len(), "Uploaded product image");
    Ok((StatusCode::CREATED, Json(ImageResponse::from(model))))
}

async fn get_image(
    Path((product_id, id)): Path<(i32, i32)>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    let model = find_image(&*db, product_id, id).await?;
    Ok(Json(ImageResponse::from(model)))
}

async fn delete_image(
    Path((product_id, id)): Path<(i32, i32)>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<Config>>,
) -> Result<impl IntoResponse, ApiError> {
    let txn = db.begin().await?;
    let model = find_image(&txn, product_id, id).await?;
    let path = config.media_root.join(model.relative_path());

    model.delete(&txn).await?;
    txn.commit().await?;
    remove_file(&path).await;

    info!(product_id, image_id = id, "Deleted product image");
    Ok(StatusCode::NO_CONTENT)
}

async fn find_image<C>(conn: &C, product_id: i32, id: i32) -> Result<product_image::Model, ApiError>
where
    C: ConnectionTrait,
{
    product_image::Entity::find_by_id(id)
        .filter(product_image::Column::ProductId.eq(product_id))
        .one(conn)
        .await?
        .ok_or_else(ApiError::not_found)
}

/// Writes `data` to `path`. A failed write leaves no partial file behind.
async fn store_file(path: &std::path::Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    if let Err(err) = tokio::fs::write(path, data).await {
        remove_file(path).await;
        return Err(err);
    }
    Ok(())
}

async fn remove_file(path: &std::path::Path) {
    if let Err(err) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %err, "Failed to remove image file");
    }
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::BadRequest(err.body_text())
    }
}

//Structs
#[derive(Serialize, Debug)]
pub struct ImageResponse {
    pub id: i32,
    pub file_name: String,
    pub image: String,
}

impl From<product_image::Model> for ImageResponse {
    fn from(value: product_image::Model) -> Self {
        ImageResponse {
            image: format!("/media/images/{}", value.id),
            id: value.id,
            file_name: value.file_name,
        }
    }
}
