use axum::{
    extract::Extension,
    response::IntoResponse,
    routing::patch,
    Json, Router,
};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::entities::user;
use crate::error::ApiError;
use crate::extract::{Path, ValidatedJson};

pub fn admin_user_router() -> Router {
    Router::new().route("/users/:user_id", patch(patch_user))
}

/// Grants or revokes staff status and order history access.
async fn patch_user(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    ValidatedJson(payload): ValidatedJson<PatchUser>,
) -> Result<impl IntoResponse, ApiError> {
    let txn = db.begin().await?;
    let model = user::Entity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(ApiError::not_found)?;

    let mut model: user::ActiveModel = model.into();
    if let Some(is_staff) = payload.is_staff {
        model.is_staff = Set(is_staff);
    }
    if let Some(can_view_history) = payload.can_view_history {
        model.can_view_history = Set(can_view_history);
    }
    let model = model.update(&txn).await?;
    txn.commit().await?;

    info!(
        user_id = model.id,
        is_staff = model.is_staff,
        can_view_history = model.can_view_history,
        "Updated user permissions"
    );
    Ok(Json(UserPermissions::from(model)))
}

#[derive(Deserialize, Validate, Debug)]
struct PatchUser {
    is_staff: Option<bool>,
    can_view_history: Option<bool>,
}

#[derive(Serialize)]
struct UserPermissions {
    id: i32,
    username: String,
    is_staff: bool,
    can_view_history: bool,
}

impl From<user::Model> for UserPermissions {
    fn from(value: user::Model) -> Self {
        UserPermissions {
            id: value.id,
            username: value.username,
            is_staff: value.is_staff,
            can_view_history: value.can_view_history,
        }
    }
}
