//! Persistence for identities, facilities and password reset tokens.
//!
//! [`AuthStore`] is the only way the auth core touches durable state.
//! [`postgres::PgAuthStore`] is the production implementation;
//! [`memory::MemoryAuthStore`] backs tests and the development
//! `--memory-store` mode.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::AuthError;
use crate::auth::lockout::{LockoutPolicy, LockoutState};
use crate::models::auth::{Facility, Identity, NewIdentity, ResetTokenRecord};

/// Normalise an email for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
pub trait AuthStore: Send + Sync {
    /// Case-insensitive lookup.
    async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, AuthError>;

    async fn find_identity(&self, id: Uuid) -> Result<Option<Identity>, AuthError>;

    /// Insert an identity. Fails with `DuplicateEmail` or `InvalidFacility`.
    async fn create_identity(&self, new: NewIdentity) -> Result<Identity, AuthError>;

    /// Whether any active administrator exists.
    async fn admin_exists(&self) -> Result<bool, AuthError>;

    /// Identities, optionally restricted to one facility, oldest first.
    async fn list_identities(&self, facility: Option<Uuid>) -> Result<Vec<Identity>, AuthError>;

    /// Assign (`Some`) or remove (`None`) an identity's facility.
    async fn set_facility(
        &self,
        id: Uuid,
        facility_id: Option<Uuid>,
    ) -> Result<Identity, AuthError>;

    /// Soft-delete: flip the active flag off. Returns `false` if no such identity.
    async fn deactivate_identity(&self, id: Uuid) -> Result<bool, AuthError>;

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), AuthError>;

    /// Apply one failed attempt atomically and return the new state.
    async fn record_failed_login(
        &self,
        id: Uuid,
        policy: &LockoutPolicy,
        now: DateTime<Utc>,
    ) -> Result<LockoutState, AuthError>;

    /// Reset the lockout counters and stamp the last login.
    async fn record_successful_login(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), AuthError>;

    async fn find_facility(&self, id: Uuid) -> Result<Option<Facility>, AuthError>;

    /// The facility owned by `owner_id`, if any (earliest created wins).
    async fn facility_owned_by(&self, owner_id: Uuid) -> Result<Option<Uuid>, AuthError>;

    async fn insert_reset_token(&self, record: &ResetTokenRecord) -> Result<(), AuthError>;

    /// Atomically mark the token used, set the new password hash and clear
    /// lockout state. Exactly one concurrent caller can win for a given token.
    async fn consume_reset_token(
        &self,
        token_hash: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Uuid, AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email("  C@X.Com "), "c@x.com");
    }
}
