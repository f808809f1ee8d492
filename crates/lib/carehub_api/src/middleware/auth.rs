//! Authentication middleware: Bearer token extraction and identity resolution.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use carehub_core::auth::AuthError;

use crate::AppState;
use crate::error::AppError;
use crate::services::auth::authenticate;

/// Axum middleware: extracts `Authorization: Bearer <token>`, verifies it,
/// loads the identity and injects its `IdentitySummary` into request
/// extensions. Never consults the session store.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())?;
    let identity = authenticate(&state, token).await?;
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// The token after a case-sensitive `Bearer ` prefix.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingToken)
}
