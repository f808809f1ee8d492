//! Authentication flows composed from `carehub_core::auth`.

use carehub_core::auth::AuthError;
use carehub_core::auth::lockout::{AttemptGate, LockoutState};
use carehub_core::auth::password::{self, UNMATCHED_LOGIN_HASH, validate_new_password};
use carehub_core::auth::reset::{hash_reset_token, new_reset_token};
use carehub_core::auth::session::Session;
use carehub_core::authz::Role;
use carehub_core::models::auth::{Identity, IdentitySummary, NewIdentity, TokenPair};
use tracing::{debug, info, warn};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{
    LoginResponse, ProfileDetails, ProfileResponse, RefreshResponse, RegisterRequest, UserView,
};

// ---------------------------------------------------------------------------
// Password hashing off the async workers
// ---------------------------------------------------------------------------

async fn hash_password(password: &str) -> AppResult<String> {
    let password = password.to_owned();
    Ok(tokio::task::spawn_blocking(move || password::hash_password(&password)).await??)
}

async fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let (password, hash) = (password.to_owned(), hash.to_owned());
    Ok(tokio::task::spawn_blocking(move || password::verify_password(&password, &hash)).await?)
}

fn require_field(value: &str, field: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(())
}

fn validate_email(email: &str) -> AppResult<()> {
    require_field(email, "email")?;
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(AppError::Validation("email is invalid".into())),
    }
}

// ---------------------------------------------------------------------------
// Authentication gate
// ---------------------------------------------------------------------------

/// Resolve a bearer access token to the identity it names.
///
/// Refresh tokens are rejected as invalid. Store failures surface as
/// infrastructure errors.
pub async fn authenticate(state: &AppState, token: &str) -> AppResult<IdentitySummary> {
    let claims = state.tokens.verify(token)?;
    if claims.is_refresh() {
        return Err(AuthError::InvalidToken.into());
    }
    let identity = state
        .store
        .find_identity(claims.sub)
        .await?
        .ok_or(AuthError::UnknownIdentity)?;
    if !identity.is_active {
        return Err(AuthError::AccountDeactivated.into());
    }
    Ok(identity.summary())
}

// ---------------------------------------------------------------------------
// Flows
// ---------------------------------------------------------------------------

/// Authenticate with email + password.
///
/// Order: lockout, then active flag, then password. Unknown emails and wrong
/// passwords answer identically.
pub async fn login(state: &AppState, email: &str, password: &str) -> AppResult<LoginResponse> {
    require_field(email, "email")?;
    require_field(password, "password")?;

    let Some(identity) = state.store.find_identity_by_email(email).await? else {
        verify_password(password, UNMATCHED_LOGIN_HASH).await?;
        debug!(email, "login for unknown email");
        return Err(AuthError::InvalidCredentials.into());
    };

    let now = state.clock.now();
    let policy = &state.config.lockout;
    if let AttemptGate::Locked { until } = policy.gate(identity.lockout_state(), now) {
        warn!(identity_id = %identity.id, %until, "login rejected: account locked");
        return Err(AuthError::AccountLocked { until }.into());
    }
    if !identity.is_active {
        return Err(AuthError::AccountDeactivated.into());
    }

    if !verify_password(password, &identity.password_hash).await? {
        match state.store.record_failed_login(identity.id, policy, now).await? {
            LockoutState::Locked { until } => {
                warn!(identity_id = %identity.id, %until, "too many failed logins; account locked");
            }
            LockoutState::Unlocked { attempts } => {
                warn!(identity_id = %identity.id, attempts, "failed login");
            }
        }
        return Err(AuthError::InvalidCredentials.into());
    }

    state.store.record_successful_login(identity.id, now).await?;
    let tokens = state.tokens.issue_pair(identity.id)?;
    state.sessions.create(identity.id, tokens.clone()).await;

    info!(identity_id = %identity.id, role = %identity.role, "login succeeded");

    let mut user = UserView::from(&identity);
    user.last_login_at = Some(now);
    Ok(LoginResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        expires_in: state.tokens.access_ttl().num_seconds(),
        user,
    })
}

/// Create an identity. Callers must already be administrators.
pub async fn register(state: &AppState, req: RegisterRequest) -> AppResult<Identity> {
    validate_email(&req.email)?;
    require_field(&req.name, "name")?;
    require_field(&req.role, "role")?;
    let role = req
        .role
        .parse::<Role>()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    validate_new_password(&req.password)?;

    let password_hash = hash_password(&req.password).await?;
    let identity = state
        .store
        .create_identity(NewIdentity {
            email: req.email.trim().to_string(),
            password_hash,
            name: req.name.trim().to_string(),
            role,
            facility_id: req.facility_id,
        })
        .await?;

    info!(identity_id = %identity.id, role = %identity.role, "identity registered");
    Ok(identity)
}

/// Create the first administrator if none exists. Returns `None` when one
/// already does.
pub async fn bootstrap_admin(
    state: &AppState,
    email: &str,
    password: &str,
    name: &str,
) -> AppResult<Option<Identity>> {
    if state.store.admin_exists().await? {
        debug!("administrator already present; skipping bootstrap");
        return Ok(None);
    }
    let identity = register(
        state,
        RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            name: name.to_string(),
            role: Role::Administrator.as_str().to_string(),
            facility_id: None,
        },
    )
    .await?;
    info!(identity_id = %identity.id, "bootstrap administrator created");
    Ok(Some(identity))
}

/// Exchange a refresh token for a new access token.
pub async fn refresh(state: &AppState, refresh_token: &str) -> AppResult<RefreshResponse> {
    require_field(refresh_token, "refreshToken")?;
    let (claims, access_token) = state.tokens.refresh_access_token(refresh_token)?;

    let identity = state
        .store
        .find_identity(claims.sub)
        .await?
        .ok_or(AuthError::UnknownIdentity)?;
    if !identity.is_active {
        return Err(AuthError::AccountDeactivated.into());
    }

    let pair = TokenPair {
        access_token: access_token.clone(),
        refresh_token: refresh_token.to_string(),
    };
    if state.sessions.update(identity.id, pair).await.is_none() {
        debug!(identity_id = %identity.id, "refresh without a live session");
    }

    Ok(RefreshResponse {
        access_token,
        expires_in: state.tokens.access_ttl().num_seconds(),
    })
}

/// Best-effort session removal. Never fails.
pub async fn logout(state: &AppState, refresh_token: Option<&str>) {
    let Some(token) = refresh_token.filter(|t| !t.is_empty()) else {
        return;
    };
    match state.tokens.verify(token) {
        Ok(claims) if !claims.is_refresh() => {
            debug!(identity_id = %claims.sub, "logout with an access token ignored");
        }
        Ok(claims) => {
            state.sessions.remove(claims.sub).await;
            info!(identity_id = %claims.sub, "logged out");
        }
        Err(e) => debug!(error = %e, "logout with unusable token"),
    }
}

/// The caller's identity, permissions and facility.
pub async fn profile(state: &AppState, caller: &IdentitySummary) -> AppResult<ProfileResponse> {
    let identity = state
        .store
        .find_identity(caller.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    let facility = match identity.facility_id {
        Some(id) => state.store.find_facility(id).await?,
        None => None,
    };
    Ok(ProfileResponse {
        user: UserView::from(&identity),
        profile: ProfileDetails {
            permissions: state.config.role_permissions.permissions_for(identity.role),
            facility,
        },
    })
}

pub async fn current_session(state: &AppState, caller: &IdentitySummary) -> AppResult<Session> {
    state
        .sessions
        .get(caller.id)
        .await
        .ok_or_else(|| AppError::NotFound("No active session".into()))
}

/// Issue a reset token for `email`.
///
/// The outcome is the same whether or not the email exists. The plaintext
/// token is only returned in development mode.
pub async fn forgot_password(state: &AppState, email: &str) -> AppResult<Option<String>> {
    require_field(email, "email")?;

    let identity = match state.store.find_identity_by_email(email).await? {
        Some(identity) if identity.is_active => identity,
        Some(identity) => {
            debug!(identity_id = %identity.id, "password reset for inactive identity ignored");
            return Ok(None);
        }
        None => {
            debug!(email, "password reset for unknown email ignored");
            return Ok(None);
        }
    };

    let (token, record) = new_reset_token(identity.id, state.clock.now());
    state.store.insert_reset_token(&record).await?;

    if state.config.is_development() {
        info!(identity_id = %identity.id, reset_token = %token, "password reset token issued");
        Ok(Some(token))
    } else {
        info!(identity_id = %identity.id, "password reset token issued");
        Ok(None)
    }
}

/// Redeem a reset token and set a new password.
pub async fn reset_password(state: &AppState, token: &str, new_password: &str) -> AppResult<()> {
    require_field(token, "token")?;
    validate_new_password(new_password)?;

    let password_hash = hash_password(new_password).await?;
    let identity_id = state
        .store
        .consume_reset_token(&hash_reset_token(token), &password_hash, state.clock.now())
        .await?;
    state.sessions.remove(identity_id).await;

    info!(identity_id = %identity_id, "password reset");
    Ok(())
}

/// Replace the caller's password after checking the current one.
pub async fn change_password(
    state: &AppState,
    caller: &IdentitySummary,
    current_password: &str,
    new_password: &str,
) -> AppResult<()> {
    require_field(current_password, "currentPassword")?;
    let identity = state
        .store
        .find_identity(caller.id)
        .await?
        .ok_or(AuthError::UnknownIdentity)?;
    if !verify_password(current_password, &identity.password_hash).await? {
        return Err(AppError::Validation("Current password is incorrect".into()));
    }
    validate_new_password(new_password)?;

    let password_hash = hash_password(new_password).await?;
    state.store.update_password(identity.id, &password_hash).await?;

    info!(identity_id = %identity.id, "password changed");
    Ok(())
}
