use axum::{
    extract::Extension,
    http::StatusCode,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::entities::order::{self, PaymentStatus};
use crate::error::ApiError;
use crate::extract::{Path, ValidatedJson};
use crate::middleware::auth::AuthUser;
use crate::middleware::permissions::{permission_middleware, Permission};
use crate::services::{
    customer::find_by_user,
    order::{order_detail, order_details, place_order},
};

//ROUTERS
pub fn order_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/orders", get(get_orders).post(create_order))
        .route("/orders/:order_id", get(get_order).patch(patch_order))
        .route_layer(from_fn_with_state(
            Permission::Authenticated,
            permission_middleware,
        ))
        .layer(Extension(db))
}

//ROUTES
async fn create_order(
    auth: AuthUser,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    ValidatedJson(payload): ValidatedJson<CreateOrder>,
) -> Result<impl IntoResponse, ApiError> {
    let order = place_order(&*db, payload.cart_id, auth.id).await?;
    let detail = order_detail(&*db, order).await?;

    Ok((StatusCode::CREATED, Json(detail)))
}

async fn get_orders(
    auth: AuthUser,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    let mut select = order::Entity::find().order_by_asc(order::Column::Id);

    if !auth.is_staff {
        match find_by_user(&*db, auth.id).await? {
            Some(customer) => select = select.filter(order::Column::CustomerId.eq(customer.id)),
            None => return Ok(Json(Vec::new())),
        }
    }

    let orders = select.all(&*db).await?;
    Ok(Json(order_details(&*db, orders).await?))
}

async fn get_order(
    Path(id): Path<i32>,
    auth: AuthUser,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    let order = order::Entity::find_by_id(id)
        .one(&*db)
        .await?
        .ok_or_else(ApiError::not_found)?;

    if !auth.is_staff {
        let owner = find_by_user(&*db, auth.id).await?;
        if owner.map(|customer| customer.id) != Some(order.customer_id) {
            return Err(ApiError::not_found());
        }
    }

    Ok(Json(order_detail(&*db, order).await?))
}

async fn patch_order(
    Path(id): Path<i32>,
    auth: AuthUser,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    ValidatedJson(payload): ValidatedJson<UpdateOrder>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_staff()?;

    let txn = db.begin().await?;
    let order = order::Entity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(ApiError::not_found)?;

    let mut order: order::ActiveModel = order.into();
    order.payment_status = Set(payload.payment_status);
    let order = order.update(&txn).await?;
    let detail = order_detail(&txn, order).await?;
    txn.commit().await?;

    info!(order_id = id, payment_status = ?detail.payment_status, "Updated order");
    Ok(Json(detail))
}

//Structs
#[derive(Deserialize, Validate, Debug)]
struct CreateOrder {
    cart_id: Uuid,
}

#[derive(Deserialize, Validate, Debug)]
struct UpdateOrder {
    payment_status: PaymentStatus,
}
