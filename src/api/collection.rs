use axum::{
    extract::Extension,
    http::StatusCode,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryOrder,
    Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::entities::{collection, product};
use crate::error::ApiError;
use crate::extract::{double_option, Path, ValidatedJson};
use crate::middleware::permissions::{permission_middleware, Permission};
use crate::services::catalog::{ensure_collection_deletable, products_count, products_counts};

//ROUTERS
pub fn collection_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/collections", get(get_collections).post(create_collection))
        .route(
            "/collections/:id",
            get(get_collection)
                .put(update_collection)
                .patch(patch_collection)
                .delete(delete_collection),
        )
        .route_layer(from_fn_with_state(
            Permission::AdminOrReadOnly,
            permission_middleware,
        ))
        .layer(Extension(db))
}

//ROUTES
async fn get_collections(
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    let collections = collection::Entity::find()
        .order_by_asc(collection::Column::Title)
        .all(&*db)
        .await?;
    let counts = products_counts(&*db).await?;

    let response: Vec<CollectionResponse> = collections
        .into_iter()
        .map(|model| {
            let count = counts.get(&model.id).copied().unwrap_or_default();
            CollectionResponse::new(model, count)
        })
        .collect();

    Ok(Json(response))
}

async fn create_collection(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    ValidatedJson(payload): ValidatedJson<CollectionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let txn = db.begin().await?;

    check_featured_product(&txn, payload.featured_product).await?;

    let model = collection::ActiveModel {
        title: Set(payload.title),
        featured_product_id: Set(payload.featured_product),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    info!(collection_id = model.id, "Created collection");
    Ok((StatusCode::CREATED, Json(CollectionResponse::new(model, 0))))
}

async fn get_collection(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    let model = find_collection(&*db, id).await?;
    let count = products_count(&*db, model.id).await?;

    Ok(Json(CollectionResponse::new(model, count)))
}

async fn update_collection(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    ValidatedJson(payload): ValidatedJson<CollectionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let txn = db.begin().await?;
    let model = find_collection(&txn, id).await?;

    check_featured_product(&txn, payload.featured_product).await?;

    let mut model: collection::ActiveModel = model.into();
    model.title = Set(payload.title);
    model.featured_product_id = Set(payload.featured_product);
    let model = model.update(&txn).await?;

    let count = products_count(&txn, model.id).await?;
    txn.commit().await?;

    Ok(Json(CollectionResponse::new(model, count)))
}

async fn patch_collection(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    ValidatedJson(payload): ValidatedJson<PatchCollection>,
) -> Result<impl IntoResponse, ApiError> {
    let txn = db.begin().await?;
    let model = find_collection(&txn, id).await?;
    let mut model: collection::ActiveModel = model.into();

    if let Some(title) = payload.title {
        model.title = Set(title);
    }
    if let Some(featured_product) = payload.featured_product {
        check_featured_product(&txn, featured_product).await?;
        model.featured_product_id = Set(featured_product);
    }

    let model = model.update(&txn).await?;
    let count = products_count(&txn, model.id).await?;
    txn.commit().await?;

    Ok(Json(CollectionResponse::new(model, count)))
}

async fn delete_collection(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    let txn = db.begin().await?;
    let model = find_collection(&txn, id).await?;

    ensure_collection_deletable(&txn, model.id).await?;

    model.delete(&txn).await?;
    txn.commit().await?;

    info!(collection_id = id, "Deleted collection");
    Ok(StatusCode::NO_CONTENT)
}

async fn find_collection<C>(conn: &C, id: i32) -> Result<collection::Model, ApiError>
where
    C: ConnectionTrait,
{
    collection::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(ApiError::not_found)
}

async fn check_featured_product<C>(conn: &C, product_id: Option<i32>) -> Result<(), ApiError>
where
    C: ConnectionTrait,
{
    let Some(product_id) = product_id else {
        return Ok(());
    };

    match product::Entity::find_by_id(product_id).one(conn).await? {
        Some(_) => Ok(()),
        None => Err(ApiError::field(
            "featured_product",
            format!("Invalid pk \"{product_id}\" - object does not exist."),
        )),
    }
}

//Structs
#[derive(Deserialize, Validate, Debug)]
struct CollectionPayload {
    #[validate(length(min = 1, max = 255, message = "This field may not be blank."))]
    title: String,
    #[serde(default)]
    featured_product: Option<i32>,
}

#[derive(Deserialize, Validate, Debug)]
struct PatchCollection {
    #[validate(length(min = 1, max = 255, message = "This field may not be blank."))]
    title: Option<String>,
    // `Some(None)` clears the featured product.
    #[serde(default, deserialize_with = "double_option")]
    featured_product: Option<Option<i32>>,
}

#[derive(Serialize)]
struct CollectionResponse {
    id: i32,
    title: String,
    products_count: i64,
}

impl CollectionResponse {
    fn new(value: collection::Model, products_count: i64) -> CollectionResponse {
        CollectionResponse {
            id: value.id,
            title: value.title,
            products_count,
        }
    }
}
