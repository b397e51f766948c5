use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::config::Config;
use crate::entities::user::{self, hash_password, Entity as UserEntity};
use crate::error::ApiError;
use crate::extract::ValidatedJson;
use crate::middleware::auth::{generate_token, AuthUser};

pub fn auth_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/auth/users", post(register_user))
        .route("/auth/users/me", get(current_user))
        .route("/auth/jwt/create", post(login))
        .layer(Extension(db))
}

async fn register_user(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    ValidatedJson(payload): ValidatedJson<CreateUser>,
) -> Result<impl IntoResponse, ApiError> {
    let txn = db.begin().await?;

    let taken = UserEntity::find()
        .filter(user::Column::Username.eq(payload.username.as_str()))
        .one(&txn)
        .await?;
    if taken.is_some() {
        return Err(ApiError::Conflict(
            "A user with that username already exists.".to_owned(),
        ));
    }

    let password =
        hash_password(&payload.password).map_err(|err| ApiError::PasswordHash(err.to_string()))?;

    let model = user::ActiveModel {
        username: Set(payload.username),
        email: Set(payload.email),
        first_name: Set(payload.first_name),
        last_name: Set(payload.last_name),
        password: Set(password),
        is_staff: Set(false),
        can_view_history: Set(false),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    info!(user_id = model.id, username = %model.username, "Registered user");
    Ok((StatusCode::CREATED, Json(UserResponse::from(model))))
}

async fn login(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<Config>>,
    ValidatedJson(payload): ValidatedJson<UserLogin>,
) -> Result<impl IntoResponse, ApiError> {
    let model = UserEntity::find()
        .filter(user::Column::Username.eq(payload.username.as_str()))
        .one(&*db)
        .await?;

    let model = match model {
        Some(model) if model.check_hash(&payload.password).is_ok() => model,
        _ => return Err(ApiError::InvalidCredentials),
    };

    let token = generate_token(model.id, &config.secret, config.token_ttl_hours)
        .map_err(|_| ApiError::TokenGeneration)?;

    Ok(Json(json!({ "token": token })))
}

async fn current_user(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let model = UserEntity::find_by_id(auth.id)
        .one(&*db)
        .await?
        .ok_or_else(ApiError::not_found)?;

    Ok(Json(UserResponse::from(model)))
}

//structs
#[derive(Deserialize, Validate, Debug)]
struct CreateUser {
    #[validate(length(min = 1, max = 150, message = "Ensure this field has between 1 and 150 characters."))]
    username: String,
    #[validate(length(min = 8, message = "This password is too short. It must contain at least 8 characters."))]
    password: String,
    #[validate(email(message = "Enter a valid email address."))]
    email: String,
    #[serde(default)]
    #[validate(length(max = 150))]
    first_name: String,
    #[serde(default)]
    #[validate(length(max = 150))]
    last_name: String,
}

#[derive(Deserialize, Validate, Debug)]
struct UserLogin {
    #[validate(length(min = 1, message = "This field may not be blank."))]
    username: String,
    #[validate(length(min = 1, message = "This field may not be blank."))]
    password: String,
}

#[derive(Serialize)]
struct UserResponse {
    id: i32,
    username: String,
    email: String,
    first_name: String,
    last_name: String,
}

impl From<user::Model> for UserResponse {
    fn from(value: user::Model) -> Self {
        UserResponse {
            id: value.id,
            username: value.username,
            email: value.email,
            first_name: value.first_name,
            last_name: value.last_name,
        }
    }
}
