use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::api::product::find_product;
use crate::entities::review;
use crate::error::ApiError;
use crate::extract::{Path, ValidatedJson};

//ROUTERS
pub fn review_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route(
            "/products/:product_id/reviews",
            get(get_reviews).post(create_review),
        )
        .route(
            "/products/:product_id/reviews/:review_id",
            get(get_review)
                .put(update_review)
                .patch(patch_review)
                .delete(delete_review),
        )
        .layer(Extension(db))
}

//ROUTES
async fn get_reviews(
    Path(product_id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    find_product(&*db, product_id).await?;

    let reviews = review::Entity::find()
        .filter(review::Column::ProductId.eq(product_id))
        .order_by_asc(review::Column::Id)
        .all(&*db)
        .await?;

    Ok(Json(reviews))
}

async fn create_review(
    Path(product_id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    ValidatedJson(payload): ValidatedJson<ReviewPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let txn = db.begin().await?;
    find_product(&txn, product_id).await?;

    let model = review::ActiveModel {
        product_id: Set(product_id),
        name: Set(payload.name),
        description: Set(payload.description),
        date: Set(Utc::now().date_naive()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    info!(product_id, review_id = model.id, "Created review");
    Ok((StatusCode::CREATED, Json(model)))
}

async fn get_review(
    Path((product_id, id)): Path<(i32, i32)>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(find_review(&*db, product_id, id).await?))
}

async fn update_review(
    Path((product_id, id)): Path<(i32, i32)>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    ValidatedJson(payload): ValidatedJson<ReviewPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let txn = db.begin().await?;
    let mut model: review::ActiveModel = find_review(&txn, product_id, id).await?.into();

    model.name = Set(payload.name);
    model.description = Set(payload.description);
    let model = model.update(&txn).await?;
    txn.commit().await?;

    Ok(Json(model))
}

async fn patch_review(
    Path((product_id, id)): Path<(i32, i32)>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    ValidatedJson(payload): ValidatedJson<PatchReview>,
) -> Result<impl IntoResponse, ApiError> {
    let txn = db.begin().await?;
    let mut model: review::ActiveModel = find_review(&txn, product_id, id).await?.into();

    if let Some(name) = payload.name {
        model.name = Set(name);
    }
    if let Some(description) = payload.description {
        model.description = Set(description);
    }
    let model = model.update(&txn).await?;
    txn.commit().await?;

    Ok(Json(model))
}

async fn delete_review(
    Path((product_id, id)): Path<(i32, i32)>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    let txn = db.begin().await?;
    find_review(&txn, product_id, id).await?.delete(&txn).await?;
    txn.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn find_review<C>(conn: &C, product_id: i32, id: i32) -> Result<review::Model, ApiError>
where
    C: ConnectionTrait,
{
    review::Entity::find_by_id(id)
        .filter(review::Column::ProductId.eq(product_id))
        .one(conn)
        .await?
        .ok_or_else(ApiError::not_found)
}

//Structs
#[derive(Deserialize, Validate, Debug)]
struct ReviewPayload {
    #[validate(length(min = 1, max = 255, message = "This field may not be blank."))]
    name: String,
    #[validate(length(min = 1, message = "This field may not be blank."))]
    description: String,
}

#[derive(Deserialize, Validate, Debug)]
struct PatchReview {
    #[validate(length(min = 1, max = 255, message = "This field may not be blank."))]
    name: Option<String>,
    #[validate(length(min = 1, message = "This field may not be blank."))]
    description: Option<String>,
}
