use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::{HeaderMap, header::AUTHORIZATION, request::Parts};
use catalog::Uploader;

use crate::error::AppError;
use crate::state::AppState;
use crate::utils::jwt;

/// Authenticated user extracted from the `Authorization: Bearer <token>` header.
///
/// Add this as a handler parameter to require authentication, or take
/// `Option<AuthUser>` on public endpoints that personalise their output.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i32,
    pub display_name: String,
    pub is_admin: bool,
}

impl AuthUser {
    /// Returns `Ok(())` if the user owns the resource or is an admin.
    pub fn require_owner_or_admin(&self, owner_id: Option<i32>) -> Result<(), AppError> {
        if self.is_admin || owner_id == Some(self.user_id) {
            Ok(())
        } else {
            Err(AppError::PermissionDenied)
        }
    }

    pub fn owns(&self, owner_id: Option<i32>) -> bool {
        owner_id == Some(self.user_id)
    }

    pub fn uploader(&self) -> Uploader {
        Uploader {
            user_id: self.user_id,
            display_name: self.display_name.clone(),
        }
    }
}

/// `Ok(None)` when no credentials were sent at all.
fn from_headers(headers: &HeaderMap, secret: &str) -> Result<Option<AuthUser>, AppError> {
    let Some(auth_header) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let token = auth_header
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AppError::TokenInvalid)?;

    let claims = jwt::verify(secret, token).map_err(|_| AppError::TokenInvalid)?;

    Ok(Some(AuthUser {
        user_id: claims.uid,
        display_name: claims.sub,
        is_admin: claims.admin,
    }))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        from_headers(&parts.headers, &state.config.auth.jwt_secret)?.ok_or(AppError::TokenMissing)
    }
}

/// A malformed or expired token is still rejected; only a missing header
/// yields `None`.
impl OptionalFromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        from_headers(&parts.headers, &state.config.auth.jwt_secret)
    }
}
