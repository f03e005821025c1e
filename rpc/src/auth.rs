//! Session-token authentication extractors.

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use chainvote_store::UserStore;
use chainvote_types::UserProfile;

use crate::{ApiError, ApiState};

/// Alternative header for clients that cannot set `Authorization`.
pub const AUTH_TOKEN_HEADER: &str = "x-auth-token";

/// The caller, resolved from `Authorization: Bearer <token>` or
/// `x-auth-token: <token>` through the session table.
pub struct AuthUser(pub UserProfile);

/// An authenticated caller with the admin role.
pub struct AdminUser(pub UserProfile);

/// The session token carried by a request, if any.
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    bearer
        .or_else(|| headers.get(AUTH_TOKEN_HEADER).and_then(|v| v.to_str().ok()))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl FromRequestParts<Arc<ApiState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<ApiState>,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers).ok_or(ApiError::Unauthorized)?;
        let user = state
            .store()
            .user_for_token(token)?
            .ok_or(ApiError::Unauthorized)?;
        Ok(AuthUser(user))
    }
}

#[async_trait]
impl FromRequestParts<Arc<ApiState>> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<ApiState>,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(ApiError::Forbidden);
        }
        Ok(AdminUser(user))
    }
}
