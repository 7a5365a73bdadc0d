use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{Credentials, LoginResponse, MessageResponse, VerifyResponse},
        extractors::AuthUser,
        jwt::JwtKeys,
        services,
    },
    error::ApiError,
    extractors::JsonBody,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/verify-token", get(verify_token))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<Credentials>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    services::register(state.users.as_ref(), &payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "User registered successfully".into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<Credentials>,
) -> Result<Json<LoginResponse>, ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let token = services::login(state.users.as_ref(), &keys, &payload).await?;
    Ok(Json(LoginResponse { token }))
}

/// Succeeds whenever the extractor accepted the token.
#[instrument]
pub async fn verify_token(AuthUser(user_id): AuthUser) -> Json<VerifyResponse> {
    Json(VerifyResponse {
        valid: true,
        user_id,
    })
}
