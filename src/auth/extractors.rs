use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use uuid::Uuid;

use super::jwt::JwtKeys;
use crate::error::{ApiError, SessionError};

/// Extracts and validates the bearer token, returning the user ID.
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let keys = JwtKeys::from_ref(state);
        let user_id = keys.verify_subject(token)?;
        Ok(AuthUser(user_id))
    }
}

/// `Ok(None)` when no credential was presented at all.
fn bearer_token(parts: &Parts) -> Result<Option<&str>, SessionError> {
    let Some(header) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = header.to_str().map_err(|_| SessionError::Invalid)?.trim();
    if value.is_empty() {
        return Ok(None);
    }

    // Expect "Bearer <token>"
    let (scheme, token) = value.split_once(' ').unwrap_or((value, ""));
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(SessionError::Invalid);
    }
    Ok(Some(token))
}
