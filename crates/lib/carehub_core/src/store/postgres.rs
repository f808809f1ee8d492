//! PostgreSQL [`AuthStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::warn;
use uuid::Uuid;

use super::{AuthStore, normalize_email};
use crate::auth::AuthError;
use crate::auth::lockout::{LockoutPolicy, LockoutState};
use crate::authz::Role;
use crate::models::auth::{Facility, Identity, NewIdentity, ResetTokenRecord};

const IDENTITY_COLUMNS: &str = "id, email, password_hash, name, role, facility_id, is_active, \
     email_verified, failed_login_attempts, locked_until, last_login_at, created_at";

#[derive(Debug, FromRow)]
struct IdentityRow {
    id: Uuid,
    email: String,
    password_hash: String,
    name: String,
    role: String,
    facility_id: Option<Uuid>,
    is_active: bool,
    email_verified: bool,
    failed_login_attempts: i32,
    locked_until: Option<DateTime<Utc>>,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<IdentityRow> for Identity {
    type Error = AuthError;

    fn try_from(row: IdentityRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse::<Role>()
            .map_err(|e| AuthError::Infrastructure(format!("identity {}: {e}", row.id)))?;
        Ok(Identity {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            name: row.name,
            role,
            facility_id: row.facility_id,
            is_active: row.is_active,
            email_verified: row.email_verified,
            failed_login_attempts: u32::try_from(row.failed_login_attempts).unwrap_or(0),
            locked_until: row.locked_until,
            last_login_at: row.last_login_at,
            created_at: row.created_at,
        })
    }
}

/// Apply the embedded schema migrations in `carehub_core/migrations/`.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Store backed by a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgAuthStore {
    pool: PgPool,
}

impl PgAuthStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn facility_exists(&self, id: Uuid) -> Result<bool, AuthError> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM facilities WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }
}

#[async_trait]
impl AuthStore for PgAuthStore {
    async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, AuthError> {
        let row = sqlx::query_as::<_, IdentityRow>(&format!(
            "SELECT {IDENTITY_COLUMNS} FROM identities WHERE lower(email) = $1"
        ))
        .bind(normalize_email(email))
        .fetch_optional(&self.pool)
        .await?;
        row.map(Identity::try_from).transpose()
    }

    async fn find_identity(&self, id: Uuid) -> Result<Option<Identity>, AuthError> {
        let row = sqlx::query_as::<_, IdentityRow>(&format!(
            "SELECT {IDENTITY_COLUMNS} FROM identities WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Identity::try_from).transpose()
    }

    async fn create_identity(&self, new: NewIdentity) -> Result<Identity, AuthError> {
        if let Some(facility_id) = new.facility_id
            && !self.facility_exists(facility_id).await?
        {
            return Err(AuthError::InvalidFacility);
        }
        let row = sqlx::query_as::<_, IdentityRow>(&format!(
            "INSERT INTO identities (email, password_hash, name, role, facility_id) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {IDENTITY_COLUMNS}"
        ))
        .bind(normalize_email(&new.email))
        .bind(&new.password_hash)
        .bind(&new.name)
        .bind(new.role.as_str())
        .bind(new.facility_id)
        .fetch_one(&self.pool)
        .await?;
        Identity::try_from(row)
    }

    async fn admin_exists(&self) -> Result<bool, AuthError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM identities WHERE role = 'admin' AND is_active)",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn list_identities(&self, facility: Option<Uuid>) -> Result<Vec<Identity>, AuthError> {
        let rows = sqlx::query_as::<_, IdentityRow>(&format!(
            "SELECT {IDENTITY_COLUMNS} FROM identities \
             WHERE ($1::uuid IS NULL OR facility_id = $1) \
             ORDER BY created_at, email"
        ))
        .bind(facility)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Identity::try_from).collect()
    }

    async fn set_facility(
        &self,
        id: Uuid,
        facility_id: Option<Uuid>,
    ) -> Result<Identity, AuthError> {
        if let Some(facility_id) = facility_id
            && !self.facility_exists(facility_id).await?
        {
            return Err(AuthError::InvalidFacility);
        }
        let row = sqlx::query_as::<_, IdentityRow>(&format!(
            "UPDATE identities SET facility_id = $2, updated_at = now() \
             WHERE id = $1 RETURNING {IDENTITY_COLUMNS}"
        ))
        .bind(id)
        .bind(facility_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AuthError::NotFound("User".into()))?;
        Identity::try_from(row)
    }

    async fn deactivate_identity(&self, id: Uuid) -> Result<bool, AuthError> {
        let result = sqlx::query(
            "UPDATE identities SET is_active = FALSE, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), AuthError> {
        let result = sqlx::query(
            "UPDATE identities SET password_hash = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AuthError::UnknownIdentity);
        }
        Ok(())
    }

    async fn record_failed_login(
        &self,
        id: Uuid,
        policy: &LockoutPolicy,
        now: DateTime<Utc>,
    ) -> Result<LockoutState, AuthError> {
        let mut tx = self.pool.begin().await?;

        let (attempts, locked_until) = sqlx::query_as::<_, (i32, Option<DateTime<Utc>>)>(
            "SELECT failed_login_attempts, locked_until FROM identities WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AuthError::UnknownIdentity)?;

        let current = match locked_until {
            Some(until) => LockoutState::Locked { until },
            None => LockoutState::Unlocked {
                attempts: u32::try_from(attempts).unwrap_or(0),
            },
        };
        let next = policy.register_failure(current, now);
        let (attempts, locked_until) = next.to_columns(policy.threshold);

        sqlx::query(
            "UPDATE identities SET failed_login_attempts = $2, locked_until = $3, \
             updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(i32::try_from(attempts).unwrap_or(i32::MAX))
        .bind(locked_until)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(next)
    }

    async fn record_successful_login(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), AuthError> {
        sqlx::query(
            "UPDATE identities SET failed_login_attempts = 0, locked_until = NULL, \
             last_login_at = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_facility(&self, id: Uuid) -> Result<Option<Facility>, AuthError> {
        let row = sqlx::query_as::<_, (Uuid, String, Option<Uuid>)>(
            "SELECT id, name, owner_id FROM facilities WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id, name, owner_id)| Facility { id, name, owner_id }))
    }

    async fn facility_owned_by(&self, owner_id: Uuid) -> Result<Option<Uuid>, AuthError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM facilities WHERE owner_id = $1 ORDER BY created_at LIMIT 2",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        if ids.len() > 1 {
            warn!(owner_id = %owner_id, "identity owns several facilities; using the earliest");
        }
        Ok(ids.first().copied())
    }

    async fn insert_reset_token(&self, record: &ResetTokenRecord) -> Result<(), AuthError> {
        sqlx::query(
            "INSERT INTO password_reset_tokens \
             (id, identity_id, token_hash, expires_at, used, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(record.id)
        .bind(record.identity_id)
        .bind(&record.token_hash)
        .bind(record.expires_at)
        .bind(record.used)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn consume_reset_token(
        &self,
        token_hash: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Uuid, AuthError> {
        let mut tx = self.pool.begin().await?;

        // The row lock taken by UPDATE makes a concurrent consumer re-check
        // `used = FALSE` after we commit, so only one of them gets a row back.
        let identity_id = sqlx::query_scalar::<_, Uuid>(
            "UPDATE password_reset_tokens SET used = TRUE, used_at = $2 \
             WHERE token_hash = $1 AND used = FALSE AND expires_at > $2 \
             RETURNING identity_id",
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AuthError::InvalidOrExpiredResetToken)?;

        sqlx::query(
            "UPDATE identities SET password_hash = $2, failed_login_attempts = 0, \
             locked_until = NULL, updated_at = now() WHERE id = $1",
        )
        .bind(identity_id)
        .bind(new_password_hash)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(identity_id)
    }
}
