//! Authentication and authorization primitives.
//!
//! Provides password hashing, JWT management, the lockout state machine,
//! the session store and password-reset token helpers that `carehub_api`
//! composes into request flows.

pub mod jwt;
pub mod lockout;
pub mod password;
pub mod reset;
pub mod session;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Authentication and authorization errors.
///
/// Every variant maps to exactly one HTTP status in the API layer.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No token provided")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    ExpiredToken,

    #[error("User not found")]
    UnknownIdentity,

    #[error("Account is deactivated")]
    AccountDeactivated,

    #[error("Account is temporarily locked until {until}")]
    AccountLocked { until: DateTime<Utc> },

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Insufficient permissions")]
    InsufficientRole,

    #[error("Missing permission: {0}")]
    InsufficientPermission(String),

    #[error("Access denied")]
    AccessDenied,

    #[error("Invalid or expired reset token")]
    InvalidOrExpiredResetToken,

    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Invalid facility")]
    InvalidFacility,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Infrastructure error: {0}")]
    Infrastructure(String),
}

/// Name of the unique index on `lower(email)`.
const EMAIL_UNIQUE_INDEX: &str = "identities_email_lower_key";

impl From<sqlx::Error> for AuthError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e
            && db.is_unique_violation()
            && db.constraint() == Some(EMAIL_UNIQUE_INDEX)
        {
            return AuthError::DuplicateEmail;
        }
        AuthError::Infrastructure(e.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for AuthError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        AuthError::Infrastructure(format!("migration: {e}"))
    }
}
