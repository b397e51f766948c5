use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;
use crate::middleware::auth::AuthUser;

/// Access policy applied to a group of routes, after [`auth_middleware`] ran.
///
/// [`auth_middleware`]: crate::middleware::auth::auth_middleware
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Permission {
    /// Anyone may read, only staff may write.
    AdminOrReadOnly,
    /// Staff only.
    Admin,
    /// Any signed in user.
    Authenticated,
    /// Staff, or users granted access to customer order history.
    ViewCustomerHistory,
}

impl Permission {
    pub fn check(self, method: &Method, user: Option<&AuthUser>) -> Result<(), ApiError> {
        if self == Permission::AdminOrReadOnly && is_safe(method) {
            return Ok(());
        }

        let user = user.ok_or(ApiError::Unauthenticated)?;

        let allowed = match self {
            Permission::AdminOrReadOnly | Permission::Admin => user.is_staff,
            Permission::Authenticated => true,
            Permission::ViewCustomerHistory => user.is_staff || user.can_view_history,
        };

        if allowed {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }
}

fn is_safe(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD || *method == Method::OPTIONS
}

pub async fn permission_middleware(
    State(permission): State<Permission>,
    req: Request,
    next: Next,
) -> Response {
    match permission.check(req.method(), req.extensions().get::<AuthUser>()) {
        Ok(()) => next.run(req).await,
        Err(err) => err.into_response(),
    }
}
