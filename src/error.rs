use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::auth::AuthError;
use crate::sync::SyncError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Sync(e) => match e {
                SyncError::PermissionDenied => (StatusCode::FORBIDDEN, e.to_string()),
                SyncError::ValidationFailed(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
                SyncError::RemoteRejected(msg) => {
                    tracing::warn!("Store rejected write: {}", msg);
                    (StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
                }
                SyncError::RemoteUnavailable(msg) => {
                    tracing::error!("Store unavailable: {}", msg);
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "Document store unavailable".to_string(),
                    )
                }
            },
            AppError::Auth(AuthError::InvalidCredentials) => {
                (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string())
            }
            AppError::Auth(AuthError::OwnerSignInDisabled) => (
                StatusCode::FORBIDDEN,
                "Owner sign-in is not configured".to_string(),
            ),
            AppError::Auth(e) => {
                tracing::error!("Auth store error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, message).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
