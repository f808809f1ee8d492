//! Application error types.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use carehub_core::auth::AuthError;
use thiserror::Error;
use tracing::error;

use crate::models::ApiResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    /// Status, stable machine code and client-facing message.
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Auth(e) => match e {
                AuthError::MissingToken => {
                    (StatusCode::UNAUTHORIZED, "MISSING_TOKEN", "No token provided".into())
                }
                AuthError::InvalidToken => {
                    (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", "Invalid token".into())
                }
                AuthError::ExpiredToken => {
                    (StatusCode::UNAUTHORIZED, "EXPIRED_TOKEN", "Token expired".into())
                }
                AuthError::UnknownIdentity => {
                    (StatusCode::UNAUTHORIZED, "UNKNOWN_IDENTITY", "User not found".into())
                }
                AuthError::AccountDeactivated => (
                    StatusCode::UNAUTHORIZED,
                    "ACCOUNT_DEACTIVATED",
                    "Account is deactivated".into(),
                ),
                AuthError::AccountLocked { .. } => (
                    StatusCode::LOCKED,
                    "ACCOUNT_LOCKED",
                    "Account is temporarily locked due to too many failed login attempts".into(),
                ),
                AuthError::InvalidCredentials => (
                    StatusCode::UNAUTHORIZED,
                    "INVALID_CREDENTIALS",
                    "Invalid credentials".into(),
                ),
                AuthError::Unauthenticated => (
                    StatusCode::UNAUTHORIZED,
                    "UNAUTHENTICATED",
                    "Authentication required".into(),
                ),
                AuthError::InsufficientRole => (
                    StatusCode::FORBIDDEN,
                    "INSUFFICIENT_ROLE",
                    "Insufficient permissions".into(),
                ),
                AuthError::InsufficientPermission(_) => (
                    StatusCode::FORBIDDEN,
                    "INSUFFICIENT_PERMISSION",
                    "Insufficient permissions".into(),
                ),
                AuthError::AccessDenied => {
                    (StatusCode::FORBIDDEN, "ACCESS_DENIED", "Access denied".into())
                }
                AuthError::InvalidOrExpiredResetToken => (
                    StatusCode::BAD_REQUEST,
                    "INVALID_RESET_TOKEN",
                    "Invalid or expired reset token".into(),
                ),
                AuthError::DuplicateEmail => (
                    StatusCode::CONFLICT,
                    "DUPLICATE_EMAIL",
                    "User with this email already exists".into(),
                ),
                AuthError::InvalidFacility => {
                    (StatusCode::BAD_REQUEST, "INVALID_FACILITY", "Invalid facility".into())
                }
                AuthError::Validation(m) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", m.clone()),
                AuthError::NotFound(m) => (StatusCode::NOT_FOUND, "NOT_FOUND", format!("{m} not found")),
                AuthError::Infrastructure(_) => internal(),
            },
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", m.clone()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "NOT_FOUND", m.clone()),
            AppError::Internal(_) => internal(),
        }
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "Internal server error".into(),
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal(detail) | AppError::Auth(AuthError::Infrastructure(detail)) =
            &self
        {
            error!(error = %detail, "request failed with infrastructure error");
        }
        let (status, code, message) = self.parts();
        let mut body = ApiResponse::<serde_json::Value>::failure(code, message);
        match &self {
            AppError::Validation(m) | AppError::Auth(AuthError::Validation(m)) => {
                body.errors = Some(vec![m.clone()]);
            }
            AppError::Auth(AuthError::AccountLocked { until }) => {
                body.data = Some(serde_json::json!({ "lockedUntil": until }));
            }
            AppError::Auth(AuthError::InsufficientPermission(p)) => {
                body.data = Some(serde_json::json!({ "required": p }));
            }
            _ => {}
        }
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("blocking task failed: {e}"))
    }
}
