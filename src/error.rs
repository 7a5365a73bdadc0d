use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

/// Failures of registration and login.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Username and password are required")]
    InvalidInput,
    #[error("Username already exists")]
    AlreadyExists,
    /// Same message whether the username or the password was wrong.
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Failures of bearer token verification.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("No token provided")]
    Missing,
    #[error("Token expired")]
    Expired,
    #[error("Invalid token")]
    Invalid,
}

#[derive(Debug, Error)]
pub enum NoteError {
    #[error("{0}")]
    InvalidInput(&'static str),
    #[error("Note not found or unauthorized")]
    NotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// The only error type handlers return.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Note(#[from] NoteError),
    #[error("{0}")]
    BadRequest(&'static str),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Auth(AuthError::InvalidInput | AuthError::AlreadyExists) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Auth(AuthError::InvalidCredentials) => StatusCode::UNAUTHORIZED,
            ApiError::Session(SessionError::Missing | SessionError::Expired) => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::Session(SessionError::Invalid) => StatusCode::FORBIDDEN,
            ApiError::Note(NoteError::InvalidInput(_)) | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Note(NoteError::NotFound) => StatusCode::NOT_FOUND,
            ApiError::Auth(AuthError::Internal(_))
            | ApiError::Note(NoteError::Internal(_))
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_server_error() {
            error!(error = ?self, "request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(ErrorBody { message })).into_response()
    }
}
