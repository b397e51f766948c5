pub mod admin;
pub mod auth;
pub mod cart;
pub mod collection;
pub mod customer;
pub mod media;
pub mod order;
pub mod pagination;
pub mod product;
pub mod product_image;
pub mod review;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    Extension, Router,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use admin::admin_api_router;
use auth::auth_router;
use cart::cart_router;
use collection::collection_router;
use customer::customer_router;
use media::media_router;
use order::order_router;
use product::product_router;
use product_image::product_image_router;
use review::review_router;

use crate::config::Config;
use crate::middleware::{
    auth::{auth_middleware, AuthState},
    logging::logging_middleware,
};
use crate::tasks::TaskQueue;

pub fn create_api_router(
    shared_db: Arc<DatabaseConnection>,
    config: Arc<Config>,
    tasks: TaskQueue,
) -> Router {
    let api = Router::new()
        .merge(auth_router(shared_db.clone()))
        .merge(collection_router(shared_db.clone()))
        .merge(product_router(shared_db.clone()))
        .merge(review_router(shared_db.clone()))
        .merge(product_image_router(shared_db.clone(), config.clone()))
        .merge(cart_router(shared_db.clone()))
        .merge(customer_router(shared_db.clone()))
        .merge(order_router(shared_db.clone()))
        .nest("/admin", admin_api_router(shared_db.clone()));

    let auth_state = AuthState {
        db: shared_db.clone(),
        secret: Arc::from(config.secret.as_str()),
    };

    Router::new()
        .nest("/api", api)
        .merge(media_router(shared_db))
        .layer(Extension(config))
        .layer(Extension(tasks))
        .layer(from_fn_with_state(auth_state, auth_middleware))
        .layer(from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
}
