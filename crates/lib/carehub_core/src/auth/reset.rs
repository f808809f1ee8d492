//! Password reset tokens.
//!
//! Tokens are 64 random alphanumeric characters (~381 bits). Only the SHA-256
//! of a token is persisted; the plaintext leaves the process once, in the
//! reset link (or the development-mode response).

use chrono::{DateTime, Duration, Utc};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::auth::ResetTokenRecord;

/// Reset token lifetime: 1 hour.
pub const RESET_TOKEN_TTL_MINUTES: i64 = 60;

const RESET_TOKEN_LEN: usize = 64;

/// Generate a random reset token.
fn generate_reset_token() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(RESET_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// SHA-256 hash a reset token for storage and lookup.
pub fn hash_reset_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Create a fresh token for `identity_id`. Returns (plaintext, record to persist).
pub fn new_reset_token(identity_id: Uuid, now: DateTime<Utc>) -> (String, ResetTokenRecord) {
    let plaintext = generate_reset_token();
    let record = ResetTokenRecord {
        id: Uuid::now_v7(),
        identity_id,
        token_hash: hash_reset_token(&plaintext),
        expires_at: now + Duration::minutes(RESET_TOKEN_TTL_MINUTES),
        used: false,
        created_at: now,
    };
    (plaintext, record)
}

impl ResetTokenRecord {
    /// Usable iff never consumed and not yet expired.
    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        !self.used && self.expires_at > now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_long_and_unique() {
        let (a, _) = new_reset_token(Uuid::new_v4(), Utc::now());
        let (b, _) = new_reset_token(Uuid::new_v4(), Utc::now());
        assert_eq!(a.len(), RESET_TOKEN_LEN);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn record_stores_hash_not_plaintext() {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let (plain, record) = new_reset_token(id, now);
        assert_eq!(record.identity_id, id);
        assert_ne!(record.token_hash, plain);
        assert_eq!(record.token_hash, hash_reset_token(&plain));
        assert_eq!(record.token_hash.len(), 64);
        assert_eq!(record.expires_at, now + Duration::hours(1));
        assert!(!record.used);
    }

    #[test]
    fn redeemable_window() {
        let now = Utc::now();
        let (_, mut record) = new_reset_token(Uuid::new_v4(), now);
        assert!(record.is_redeemable(now));
        assert!(record.is_redeemable(now + Duration::minutes(59)));
        assert!(!record.is_redeemable(now + Duration::hours(1)));

        record.used = true;
        assert!(!record.is_redeemable(now));
    }
}
