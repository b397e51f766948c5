use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::entities::user;
use crate::error::ApiError;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i32,
    pub exp: usize,
}

#[derive(Clone)]
pub struct AuthState {
    pub db: Arc<DatabaseConnection>,
    pub secret: Arc<str>,
}

/// The caller, resolved from a valid token. Absent for anonymous requests.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthUser {
    pub id: i32,
    pub is_staff: bool,
    pub can_view_history: bool,
}

impl AuthUser {
    pub fn require_staff(&self) -> Result<(), ApiError> {
        if self.is_staff {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }
}

impl From<&user::Model> for AuthUser {
    fn from(value: &user::Model) -> Self {
        AuthUser {
            id: value.id,
            is_staff: value.is_staff,
            can_view_history: value.can_view_history,
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(ApiError::Unauthenticated)
    }
}

/// Resolves the bearer token, if any, into an [`AuthUser`] request extension.
///
/// Requests without an `Authorization` header pass through as anonymous; a header
/// that does not carry a valid token for an existing user is rejected with 401.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Response {
    let auth_header = match req.headers().get(header::AUTHORIZATION) {
        Some(value) => value.to_str().ok(),
        None => return next.run(req).await,
    };

    let token = match auth_header.and_then(strip_scheme) {
        Some(token) => token,
        None => return ApiError::InvalidToken.into_response(),
    };

    let claims = match validate_token(token, &state.secret) {
        Ok(claims) => claims,
        Err(err) => {
            debug!(error = %err, "Rejected token");
            return ApiError::InvalidToken.into_response();
        }
    };

    match user::Entity::find_by_id(claims.user_id).one(&*state.db).await {
        Ok(Some(model)) => {
            req.extensions_mut().insert(AuthUser::from(&model));
            next.run(req).await
        }
        Ok(None) => ApiError::InvalidToken.into_response(),
        Err(err) => ApiError::Db(err).into_response(),
    }
}

fn strip_scheme(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("JWT "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub fn generate_token(
    user_id: i32,
    secret: &str,
    ttl_hours: i64,
) -> Result<String, AuthMiddlewareError> {
    let exp = Utc::now()
        .checked_add_signed(Duration::hours(ttl_hours))
        .ok_or(AuthMiddlewareError::GenerationFail)?
        .timestamp() as usize;

    let claims = Claims { user_id, exp };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthMiddlewareError::GenerationFail)
}

pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AuthMiddlewareError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|err| match err.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthMiddlewareError::TokenExpired,
        _ => AuthMiddlewareError::ValidationFail,
    })
}

#[derive(Error, Debug, PartialEq)]
pub enum AuthMiddlewareError {
    #[error("Token expired")]
    TokenExpired,
    #[error("Failed to validate token")]
    ValidationFail,
    #[error("Failed to generate token")]
    GenerationFail,
}
