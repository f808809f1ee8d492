//! Authentication domain models.
//!
//! These are internal domain models, distinct from the API request/response
//! shapes in `carehub_api::models`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::lockout::LockoutState;
use crate::authz::role::Role;

/// Persisted identity (a user account).
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: Uuid,
    /// Stored trimmed and lowercased; lookups normalize the same way.
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: Role,
    pub facility_id: Option<Uuid>,
    pub is_active: bool,
    pub email_verified: bool,
    pub failed_login_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Identity {
    /// Current lockout state as recorded on the row (not normalised for expiry).
    pub fn lockout_state(&self) -> LockoutState {
        match self.locked_until {
            Some(until) => LockoutState::Locked { until },
            None => LockoutState::Unlocked {
                attempts: self.failed_login_attempts,
            },
        }
    }

    /// The request-scoped view attached by the authentication gate.
    pub fn summary(&self) -> IdentitySummary {
        IdentitySummary {
            id: self.id,
            email: self.email.clone(),
            role: self.role,
            facility_id: self.facility_id,
        }
    }
}

/// Fields needed to create an identity.
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: Role,
    pub facility_id: Option<Uuid>,
}

/// Identity attached to an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentitySummary {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub facility_id: Option<Uuid>,
}

/// A care facility. Only the fields the authorization boundary needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Facility {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Option<Uuid>,
}

/// JWT claims for both access and refresh tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: the identity ID.
    pub sub: Uuid,
    /// Present and equal to `"refresh"` on refresh tokens only.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Expiry (unix timestamp).
    pub exp: i64,
    /// Issued at (unix timestamp).
    pub iat: i64,
}

impl TokenClaims {
    pub fn is_refresh(&self) -> bool {
        self.token_type.as_deref() == Some(crate::auth::jwt::REFRESH_TOKEN_TYPE)
    }
}

/// An access/refresh token pair as handed to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Password reset token row. The opaque token itself is never stored.
#[derive(Debug, Clone)]
pub struct ResetTokenRecord {
    pub id: Uuid,
    pub identity_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}
