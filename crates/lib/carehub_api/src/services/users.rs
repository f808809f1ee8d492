//! Identity administration.

use carehub_core::auth::AuthError;
use carehub_core::authz::{FacilityScope, require_self_or_admin};
use carehub_core::models::auth::{Identity, IdentitySummary};
use tracing::info;
use uuid::Uuid;

use crate::AppState;
use crate::error::{AppError, AppResult};

/// Identities visible within `scope`.
pub async fn list_users(state: &AppState, scope: FacilityScope) -> AppResult<Vec<Identity>> {
    Ok(state.store.list_identities(scope.facility_filter()).await?)
}

pub async fn get_user(state: &AppState, caller: &IdentitySummary, id: Uuid) -> AppResult<Identity> {
    require_self_or_admin(Some(caller), id)?;
    state
        .store
        .find_identity(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

/// Assign or clear an identity's facility.
pub async fn set_facility(
    state: &AppState,
    caller: &IdentitySummary,
    id: Uuid,
    facility_id: Option<Uuid>,
) -> AppResult<Identity> {
    let identity = state.store.set_facility(id, facility_id).await?;
    info!(
        identity_id = %identity.id,
        facility_id = ?identity.facility_id,
        by = %caller.id,
        "facility association changed"
    );
    Ok(identity)
}

/// Soft-delete an identity and drop its session.
pub async fn deactivate_user(state: &AppState, caller: &IdentitySummary, id: Uuid) -> AppResult<()> {
    if caller.id == id {
        return Err(AppError::Validation("Cannot deactivate your own account".into()));
    }
    if !state.store.deactivate_identity(id).await? {
        return Err(AuthError::NotFound("User".into()).into());
    }
    state.sessions.remove(id).await;
    info!(identity_id = %id, by = %caller.id, "identity deactivated");
    Ok(())
}
