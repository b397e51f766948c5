pub mod listing;
pub mod notify;
pub mod user;

use axum::{middleware::from_fn_with_state, Extension, Router};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use listing::admin_listing_router;
use notify::admin_notify_router;
use user::admin_user_router;

use crate::middleware::permissions::{permission_middleware, Permission};

pub fn admin_api_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .merge(admin_listing_router())
        .merge(admin_user_router())
        .merge(admin_notify_router())
        .route_layer(from_fn_with_state(Permission::Admin, permission_middleware))
        .layer(Extension(db))
}
