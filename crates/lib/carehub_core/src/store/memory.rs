//! In-memory [`AuthStore`] for tests and development. Nothing survives a restart.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::{AuthStore, normalize_email};
use crate::auth::AuthError;
use crate::auth::lockout::{LockoutPolicy, LockoutState};
use crate::models::auth::{Facility, Identity, NewIdentity, ResetTokenRecord};

#[derive(Debug, Default)]
struct StoreData {
    identities: HashMap<Uuid, Identity>,
    facilities: HashMap<Uuid, (Facility, DateTime<Utc>)>,
    reset_tokens: HashMap<String, ResetTokenRecord>, // token_hash -> record
}

impl StoreData {
    fn identity_mut(&mut self, id: Uuid) -> Result<&mut Identity, AuthError> {
        self.identities
            .get_mut(&id)
            .ok_or(AuthError::UnknownIdentity)
    }
}

/// One lock over all tables, so every multi-row operation is atomic.
#[derive(Debug, Default)]
pub struct MemoryAuthStore {
    data: Mutex<StoreData>,
}

impl MemoryAuthStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a facility. Facility management is otherwise outside this crate.
    pub async fn insert_facility(&self, name: &str, owner_id: Option<Uuid>) -> Facility {
        let facility = Facility {
            id: Uuid::new_v4(),
            name: name.to_string(),
            owner_id,
        };
        self.data
            .lock()
            .await
            .facilities
            .insert(facility.id, (facility.clone(), Utc::now()));
        facility
    }

    /// Snapshot of a stored reset token, for inspection.
    pub async fn reset_token(&self, token_hash: &str) -> Option<ResetTokenRecord> {
        self.data.lock().await.reset_tokens.get(token_hash).cloned()
    }

    pub async fn reset_token_count(&self, identity_id: Uuid) -> usize {
        self.data
            .lock()
            .await
            .reset_tokens
            .values()
            .filter(|r| r.identity_id == identity_id)
            .count()
    }
}

#[async_trait]
impl AuthStore for MemoryAuthStore {
    async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, AuthError> {
        let email = normalize_email(email);
        let data = self.data.lock().await;
        Ok(data
            .identities
            .values()
            .find(|i| i.email.to_lowercase() == email)
            .cloned())
    }

    async fn find_identity(&self, id: Uuid) -> Result<Option<Identity>, AuthError> {
        Ok(self.data.lock().await.identities.get(&id).cloned())
    }

    async fn create_identity(&self, new: NewIdentity) -> Result<Identity, AuthError> {
        let email = normalize_email(&new.email);
        let mut data = self.data.lock().await;
        if data
            .identities
            .values()
            .any(|i| i.email.to_lowercase() == email)
        {
            return Err(AuthError::DuplicateEmail);
        }
        if let Some(facility_id) = new.facility_id
            && !data.facilities.contains_key(&facility_id)
        {
            return Err(AuthError::InvalidFacility);
        }
        let identity = Identity {
            id: Uuid::new_v4(),
            email,
            password_hash: new.password_hash,
            name: new.name,
            role: new.role,
            facility_id: new.facility_id,
            is_active: true,
            email_verified: false,
            failed_login_attempts: 0,
            locked_until: None,
            last_login_at: None,
            created_at: Utc::now(),
        };
        data.identities.insert(identity.id, identity.clone());
        debug!(identity_id = %identity.id, "identity created");
        Ok(identity)
    }

    async fn admin_exists(&self) -> Result<bool, AuthError> {
        Ok(self
            .data
            .lock()
            .await
            .identities
            .values()
            .any(|i| i.role.is_admin() && i.is_active))
    }

    async fn list_identities(&self, facility: Option<Uuid>) -> Result<Vec<Identity>, AuthError> {
        let data = self.data.lock().await;
        let mut identities: Vec<Identity> = data
            .identities
            .values()
            .filter(|i| facility.is_none() || i.facility_id == facility)
            .cloned()
            .collect();
        identities.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.email.cmp(&b.email)));
        Ok(identities)
    }

    async fn set_facility(
        &self,
        id: Uuid,
        facility_id: Option<Uuid>,
    ) -> Result<Identity, AuthError> {
        let mut data = self.data.lock().await;
        if let Some(facility_id) = facility_id
            && !data.facilities.contains_key(&facility_id)
        {
            return Err(AuthError::InvalidFacility);
        }
        let identity = data
            .identities
            .get_mut(&id)
            .ok_or_else(|| AuthError::NotFound("User".into()))?;
        identity.facility_id = facility_id;
        Ok(identity.clone())
    }

    async fn deactivate_identity(&self, id: Uuid) -> Result<bool, AuthError> {
        let mut data = self.data.lock().await;
        match data.identities.get_mut(&id) {
            Some(identity) => {
                identity.is_active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), AuthError> {
        let mut data = self.data.lock().await;
        data.identity_mut(id)?.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn record_failed_login(
        &self,
        id: Uuid,
        policy: &LockoutPolicy,
        now: DateTime<Utc>,
    ) -> Result<LockoutState, AuthError> {
        let mut data = self.data.lock().await;
        let identity = data.identity_mut(id)?;
        let next = policy.register_failure(identity.lockout_state(), now);
        let (attempts, locked_until) = next.to_columns(policy.threshold);
        identity.failed_login_attempts = attempts;
        identity.locked_until = locked_until;
        Ok(next)
    }

    async fn record_successful_login(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), AuthError> {
        let mut data = self.data.lock().await;
        let identity = data.identity_mut(id)?;
        identity.failed_login_attempts = 0;
        identity.locked_until = None;
        identity.last_login_at = Some(now);
        Ok(())
    }

    async fn find_facility(&self, id: Uuid) -> Result<Option<Facility>, AuthError> {
        Ok(self
            .data
            .lock()
            .await
            .facilities
            .get(&id)
            .map(|(f, _)| f.clone()))
    }

    async fn facility_owned_by(&self, owner_id: Uuid) -> Result<Option<Uuid>, AuthError> {
        let data = self.data.lock().await;
        Ok(data
            .facilities
            .values()
            .filter(|(f, _)| f.owner_id == Some(owner_id))
            .min_by_key(|(_, created_at)| *created_at)
            .map(|(f, _)| f.id))
    }

    async fn insert_reset_token(&self, record: &ResetTokenRecord) -> Result<(), AuthError> {
        let mut data = self.data.lock().await;
        if !data.identities.contains_key(&record.identity_id) {
            return Err(AuthError::UnknownIdentity);
        }
        data.reset_tokens
            .insert(record.token_hash.clone(), record.clone());
        Ok(())
    }

    async fn consume_reset_token(
        &self,
        token_hash: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Uuid, AuthError> {
        let mut data = self.data.lock().await;
        let identity_id = data
            .reset_tokens
            .get(token_hash)
            .filter(|r| r.is_redeemable(now))
            .map(|r| r.identity_id)
            .ok_or(AuthError::InvalidOrExpiredResetToken)?;

        let identity = data.identity_mut(identity_id)?;
        identity.password_hash = new_password_hash.to_string();
        identity.failed_login_attempts = 0;
        identity.locked_until = None;

        if let Some(record) = data.reset_tokens.get_mut(token_hash) {
            record.used = true;
        }
        Ok(identity_id)
    }
}
