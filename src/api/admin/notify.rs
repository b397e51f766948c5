use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use validator::Validate;

use crate::error::ApiError;
use crate::extract::ValidatedJson;
use crate::tasks::TaskQueue;

pub fn admin_notify_router() -> Router {
    Router::new().route("/notify", post(notify_customers))
}

/// Queues an email to every customer and answers before it is sent.
async fn notify_customers(
    Extension(tasks): Extension<TaskQueue>,
    ValidatedJson(payload): ValidatedJson<Notification>,
) -> Result<impl IntoResponse, ApiError> {
    tasks.notify_customers(payload.message)?;
    info!("Queued customer notification");
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "message": "Notification queued." })),
    ))
}

#[derive(Deserialize, Validate, Debug)]
struct Notification {
    #[validate(length(min = 1, message = "This field may not be blank."))]
    message: String,
}
