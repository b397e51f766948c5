use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::entities::cart_item;
use crate::error::ApiError;
use crate::extract::{Path, ValidatedJson};
use crate::services::cart::{
    add_item, cart_detail, cart_items, create_cart, delete_cart, find_cart, find_item_detail,
    remove_item, update_item_quantity,
};

//ROUTERS
pub fn cart_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/carts", post(post_cart))
        .route("/carts/:cart_id", get(get_cart).delete(remove_cart))
        .route("/carts/:cart_id/items", get(get_items).post(post_item))
        .route(
            "/carts/:cart_id/items/:item_id",
            get(get_item).patch(patch_item).delete(delete_item),
        )
        .layer(Extension(db))
}

//ROUTES
async fn post_cart(
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    let cart = create_cart(&*db).await?;
    let detail = cart_detail(&*db, &cart).await?;

    info!(cart_id = %cart.id, "Created cart");
    Ok((StatusCode::CREATED, Json(detail)))
}

async fn get_cart(
    Path(cart_id): Path<Uuid>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    let cart = find_cart(&*db, cart_id).await?;
    Ok(Json(cart_detail(&*db, &cart).await?))
}

async fn remove_cart(
    Path(cart_id): Path<Uuid>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    let txn = db.begin().await?;
    delete_cart(&txn, cart_id).await?;
    txn.commit().await?;

    info!(cart_id = %cart_id, "Deleted cart");
    Ok(StatusCode::NO_CONTENT)
}

async fn get_items(
    Path(cart_id): Path<Uuid>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    find_cart(&*db, cart_id).await?;
    Ok(Json(cart_items(&*db, cart_id).await?))
}

async fn post_item(
    Path(cart_id): Path<Uuid>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    ValidatedJson(payload): ValidatedJson<AddCartItem>,
) -> Result<impl IntoResponse, ApiError> {
    let txn = db.begin().await?;
    let item = add_item(&txn, cart_id, payload.product_id, payload.quantity).await?;
    txn.commit().await?;

    Ok((StatusCode::CREATED, Json(CartItemResponse::from(item))))
}

async fn get_item(
    Path((cart_id, item_id)): Path<(Uuid, i32)>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(find_item_detail(&*db, cart_id, item_id).await?))
}

async fn patch_item(
    Path((cart_id, item_id)): Path<(Uuid, i32)>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    ValidatedJson(payload): ValidatedJson<UpdateCartItem>,
) -> Result<impl IntoResponse, ApiError> {
    let txn = db.begin().await?;
    let item = update_item_quantity(&txn, cart_id, item_id, payload.quantity).await?;
    txn.commit().await?;

    Ok(Json(CartItemResponse::from(item)))
}

async fn delete_item(
    Path((cart_id, item_id)): Path<(Uuid, i32)>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    let txn = db.begin().await?;
    remove_item(&txn, cart_id, item_id).await?;
    txn.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

//Structs
#[derive(Deserialize, Validate, Debug)]
struct AddCartItem {
    product_id: i32,
    #[validate(range(min = 1, max = 32767, message = "Quantity must be between 1 and 32767."))]
    quantity: i32,
}

#[derive(Deserialize, Validate, Debug)]
struct UpdateCartItem {
    #[validate(range(min = 1, max = 32767, message = "Quantity must be between 1 and 32767."))]
    quantity: i32,
}

#[derive(Serialize, Debug)]
struct CartItemResponse {
    id: i32,
    product_id: i32,
    quantity: i32,
}

impl From<cart_item::Model> for CartItemResponse {
    fn from(value: cart_item::Model) -> Self {
        CartItemResponse {
            id: value.id,
            product_id: value.product_id,
            quantity: value.quantity,
        }
    }
}
