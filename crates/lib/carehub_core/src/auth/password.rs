//! Password hashing via bcrypt.

use super::AuthError;

/// bcrypt cost factor for every new hash.
pub const BCRYPT_COST: u32 = 12;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Well-formed cost-12 hash checked when no identity matches a login email,
/// so that path does the same bcrypt work as a wrong password.
pub const UNMATCHED_LOGIN_HASH: &str =
    "$2a$12$EXRkfkdmXn2gzds2SSitu.MW9.gAVqa9eLS1//RYtYCmB1eLHg.9q";

/// Hash a password with bcrypt (cost 12, random salt per call).
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    hash_password_with_cost(password, BCRYPT_COST)
}

/// Hash with an explicit cost. Verification reads the cost from the hash, so
/// low-cost hashes (test fixtures) still verify normally.
pub fn hash_password_with_cost(password: &str, cost: u32) -> Result<String, AuthError> {
    bcrypt::hash(password, cost).map_err(|e| AuthError::Infrastructure(format!("bcrypt hash: {e}")))
}

/// Verify a password against a bcrypt hash. A malformed hash verifies as `false`.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// Reject passwords that do not meet the minimum policy.
pub fn validate_new_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cost_hash_verifies() {
        let hash = hash_password("Abcd123!").unwrap();
        assert!(hash.starts_with("$2b$12$"));
        assert!(verify_password("Abcd123!", &hash));
    }

    #[test]
    fn wrong_password_does_not_verify() {
        let hash = hash_password_with_cost("correct horse", 4).unwrap();
        assert!(!verify_password("battery staple", &hash));
        assert!(!verify_password("correct horse ", &hash));
    }

    #[test]
    fn same_password_hashes_differently() {
        let a = hash_password_with_cost("Abcd123!", 4).unwrap();
        let b = hash_password_with_cost("Abcd123!", 4).unwrap();
        assert_ne!(a, b);
        assert!(verify_password("Abcd123!", &a));
        assert!(verify_password("Abcd123!", &b));
    }

    #[test]
    fn malformed_hash_is_false_not_error() {
        assert!(!verify_password("anything", "not-a-bcrypt-hash"));
        assert!(!verify_password("anything", ""));
    }

    #[test]
    fn unmatched_login_hash_is_full_cost() {
        assert!(UNMATCHED_LOGIN_HASH.starts_with(&format!("$2a${BCRYPT_COST}$")));
        // Parses, so verification runs the full key schedule.
        assert!(bcrypt::verify("Abcd123!", UNMATCHED_LOGIN_HASH).is_ok());
        assert!(!verify_password("Abcd123!", UNMATCHED_LOGIN_HASH));
    }

    #[test]
    fn short_password_rejected() {
        assert!(matches!(
            validate_new_password("short"),
            Err(AuthError::Validation(_))
        ));
        assert!(validate_new_password("long enough").is_ok());
    }
}
