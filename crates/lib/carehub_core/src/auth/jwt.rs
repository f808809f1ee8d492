//! JWT token generation and verification.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Duration;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tracing::{info, warn};
use uuid::Uuid;

use super::AuthError;
use crate::clock::Clock;
use crate::models::auth::{TokenClaims, TokenPair};

/// Access token lifetime: 1 hour.
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 60 * 60;

/// Refresh token lifetime: 7 days.
pub const DEFAULT_REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Value of the `type` claim on refresh tokens.
pub const REFRESH_TOKEN_TYPE: &str = "refresh";

/// Issues and verifies HS256 access and refresh tokens.
///
/// Expiry is checked against the injected [`Clock`] rather than inside
/// `jsonwebtoken`, so an expired token is reported as
/// [`AuthError::ExpiredToken`] and never folded into `InvalidToken`.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Create a service with the default lifetimes (1 hour / 7 days).
    pub fn new(secret: &[u8], clock: Arc<dyn Clock>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            access_ttl: Duration::seconds(DEFAULT_ACCESS_TOKEN_TTL_SECS),
            refresh_ttl: Duration::seconds(DEFAULT_REFRESH_TOKEN_TTL_SECS),
            clock,
        }
    }

    /// Override token lifetimes.
    pub fn with_lifetimes(mut self, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        self.access_ttl = access_ttl;
        self.refresh_ttl = refresh_ttl;
        self
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Sign `{sub}` with the access lifetime.
    pub fn issue_access_token(&self, identity_id: Uuid) -> Result<String, AuthError> {
        self.sign(identity_id, None, self.access_ttl)
    }

    /// Sign `{sub, type: "refresh"}` with the refresh lifetime.
    pub fn issue_refresh_token(&self, identity_id: Uuid) -> Result<String, AuthError> {
        self.sign(
            identity_id,
            Some(REFRESH_TOKEN_TYPE.to_string()),
            self.refresh_ttl,
        )
    }

    /// Issue a fresh access/refresh pair.
    pub fn issue_pair(&self, identity_id: Uuid) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access_token: self.issue_access_token(identity_id)?,
            refresh_token: self.issue_refresh_token(identity_id)?,
        })
    }

    /// Check signature and format, then expiry.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        let claims = decode::<TokenClaims>(token, &self.decoding, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => AuthError::InvalidToken,
            })?
            .claims;
        if self.clock.now().timestamp() >= claims.exp {
            return Err(AuthError::ExpiredToken);
        }
        Ok(claims)
    }

    /// Mint a new access token from a refresh token.
    ///
    /// The refresh token is not rotated; it stays valid until its own expiry.
    pub fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<(TokenClaims, String), AuthError> {
        let claims = self.verify(refresh_token)?;
        if !claims.is_refresh() {
            return Err(AuthError::InvalidToken);
        }
        let access_token = self.issue_access_token(claims.sub)?;
        Ok((claims, access_token))
    }

    fn sign(
        &self,
        identity_id: Uuid,
        token_type: Option<String>,
        ttl: Duration,
    ) -> Result<String, AuthError> {
        let now = self.clock.now();
        let claims = TokenClaims {
            sub: identity_id,
            token_type,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Infrastructure(format!("jwt encode: {e}")))
    }
}

/// Resolve the JWT secret: env var `JWT_SECRET` → `AUTH_SECRET` → persisted file.
pub fn resolve_jwt_secret() -> String {
    for var in ["JWT_SECRET", "AUTH_SECRET"] {
        if let Ok(secret) = std::env::var(var)
            && !secret.is_empty()
        {
            return secret;
        }
    }
    resolve_persisted_secret(&jwt_secret_path())
}

/// Read the secret at `path`, generating and persisting one if absent.
pub fn resolve_persisted_secret(path: &Path) -> String {
    if let Ok(existing) = std::fs::read_to_string(path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    match std::fs::write(path, &secret) {
        Ok(()) => info!(path = %path.display(), "generated new JWT secret"),
        Err(e) => warn!(path = %path.display(), error = %e, "could not persist JWT secret"),
    }
    secret
}

/// Path to the persisted JWT secret file.
fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("carehub")
        .join("jwt-secret")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn service(clock: &ManualClock) -> TokenService {
        TokenService::new(b"test-secret", Arc::new(clock.clone()))
    }

    #[test]
    fn access_token_verifies_immediately() {
        let clock = ManualClock::default();
        let tokens = service(&clock);
        let id = Uuid::new_v4();
        let token = tokens.issue_access_token(id).unwrap();
        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.sub, id);
        assert!(!claims.is_refresh());
        assert_eq!(claims.exp - claims.iat, DEFAULT_ACCESS_TOKEN_TTL_SECS);
    }

    #[test]
    fn access_token_expires_after_lifetime() {
        let clock = ManualClock::default();
        let tokens = service(&clock);
        let token = tokens.issue_access_token(Uuid::new_v4()).unwrap();

        clock.advance(Duration::minutes(59));
        assert!(tokens.verify(&token).is_ok());

        clock.advance(Duration::minutes(1));
        assert!(matches!(tokens.verify(&token), Err(AuthError::ExpiredToken)));
    }

    #[test]
    fn custom_lifetimes_apply() {
        let clock = ManualClock::default();
        let tokens = service(&clock).with_lifetimes(Duration::seconds(30), Duration::hours(2));
        let access = tokens.issue_access_token(Uuid::new_v4()).unwrap();
        let refresh = tokens.issue_refresh_token(Uuid::new_v4()).unwrap();
        clock.advance(Duration::seconds(31));
        assert!(matches!(tokens.verify(&access), Err(AuthError::ExpiredToken)));
        assert!(tokens.verify(&refresh).is_ok());
    }

    #[test]
    fn wrong_secret_is_invalid_not_expired() {
        let clock = ManualClock::default();
        let token = service(&clock).issue_access_token(Uuid::new_v4()).unwrap();
        let other = TokenService::new(b"other-secret", Arc::new(clock.clone()));
        assert!(matches!(other.verify(&token), Err(AuthError::InvalidToken)));

        // Even once expired, a bad signature is still reported as invalid.
        clock.advance(Duration::days(1));
        assert!(matches!(other.verify(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn garbage_is_invalid() {
        let clock = ManualClock::default();
        let tokens = service(&clock);
        assert!(matches!(tokens.verify("not.a.jwt"), Err(AuthError::InvalidToken)));
        assert!(matches!(tokens.verify(""), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn refresh_mints_access_for_same_identity() {
        let clock = ManualClock::default();
        let tokens = service(&clock);
        let id = Uuid::new_v4();
        let refresh = tokens.issue_refresh_token(id).unwrap();

        clock.advance(Duration::hours(3));
        let (claims, access) = tokens.refresh_access_token(&refresh).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(tokens.verify(&access).unwrap().sub, id);

        // Not rotated: the same refresh token still works.
        assert!(tokens.refresh_access_token(&refresh).is_ok());
    }

    #[test]
    fn refresh_rejects_access_token() {
        let clock = ManualClock::default();
        let tokens = service(&clock);
        let access = tokens.issue_access_token(Uuid::new_v4()).unwrap();
        assert!(matches!(
            tokens.refresh_access_token(&access),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn refresh_rejects_other_type_claim() {
        let clock = ManualClock::default();
        let tokens = service(&clock);
        let claims = TokenClaims {
            sub: Uuid::new_v4(),
            token_type: Some("access".into()),
            exp: (clock.now() + Duration::hours(1)).timestamp(),
            iat: clock.now().timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();
        assert!(tokens.verify(&token).is_ok());
        assert!(matches!(
            tokens.refresh_access_token(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn expired_refresh_token_is_expired() {
        let clock = ManualClock::default();
        let tokens = service(&clock);
        let refresh = tokens.issue_refresh_token(Uuid::new_v4()).unwrap();
        clock.advance(Duration::days(7));
        assert!(matches!(
            tokens.refresh_access_token(&refresh),
            Err(AuthError::ExpiredToken)
        ));
    }

    #[test]
    fn persisted_secret_is_generated_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("jwt-secret");
        let first = resolve_persisted_secret(&path);
        assert_eq!(first.len(), 64);
        let second = resolve_persisted_secret(&path);
        assert_eq!(first, second);
    }
}
