//! Facility scoping: which facility's records a request may see.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use super::role::Role;
use crate::auth::AuthError;
use crate::models::auth::IdentitySummary;
use crate::store::AuthStore;

/// Data-visibility constraint derived per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "facilityId", rename_all = "camelCase")]
pub enum FacilityScope {
    Unrestricted,
    RestrictedTo(Uuid),
}

impl FacilityScope {
    /// The facility predicate to apply to a query, if any.
    pub fn facility_filter(&self) -> Option<Uuid> {
        match self {
            FacilityScope::Unrestricted => None,
            FacilityScope::RestrictedTo(id) => Some(*id),
        }
    }

    /// Whether a record belonging to `facility` is visible.
    pub fn permits(&self, facility: Option<Uuid>) -> bool {
        match self {
            FacilityScope::Unrestricted => true,
            FacilityScope::RestrictedTo(id) => facility == Some(*id),
        }
    }
}

/// What to do when a non-administrator has no facility to scope to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScopeFallback {
    /// Apply no constraint (log a diagnostic).
    #[default]
    Allow,
    /// Refuse the request with `AccessDenied`.
    Deny,
}

impl fmt::Display for ScopeFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScopeFallback::Allow => "allow",
            ScopeFallback::Deny => "deny",
        })
    }
}

impl FromStr for ScopeFallback {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(ScopeFallback::Allow),
            "deny" => Ok(ScopeFallback::Deny),
            other => Err(format!("expected 'allow' or 'deny', got '{other}'")),
        }
    }
}

/// Derive the facility scope for an authenticated identity.
///
/// Supervisors without a direct association fall back to the facility they
/// own; that is the only lookup this performs.
pub async fn derive_scope(
    identity: &IdentitySummary,
    store: &dyn AuthStore,
    fallback: ScopeFallback,
) -> Result<FacilityScope, AuthError> {
    let facility = match identity.role {
        Role::Administrator => return Ok(FacilityScope::Unrestricted),
        Role::Supervisor => match identity.facility_id {
            Some(id) => Some(id),
            None => store.facility_owned_by(identity.id).await?,
        },
        Role::Physician | Role::Caregiver => identity.facility_id,
    };

    match (facility, fallback) {
        (Some(id), _) => Ok(FacilityScope::RestrictedTo(id)),
        (None, ScopeFallback::Allow) => {
            warn!(
                identity_id = %identity.id,
                role = %identity.role,
                "no facility associated; applying no facility constraint"
            );
            Ok(FacilityScope::Unrestricted)
        }
        (None, ScopeFallback::Deny) => {
            warn!(
                identity_id = %identity.id,
                role = %identity.role,
                "no facility associated; denying"
            );
            Err(AuthError::AccessDenied)
        }
    }
}
