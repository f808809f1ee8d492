//! Request extractors.
//!
//! These read the identity that [`require_auth`](crate::middleware::auth::require_auth)
//! attached and run the authorization gates on it, so a handler's signature
//! states what it requires.

use axum::extract::{FromRequest, FromRequestParts};
use axum::http::request::Parts;
use carehub_core::authz::{self, Role};
use carehub_core::models::auth::IdentitySummary;

use crate::error::AppError;

/// JSON body whose rejections use the uniform error envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Path parameters whose rejections use the uniform error envelope.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub IdentitySummary);

impl<S: Send + Sync> FromRequestParts<S> for CurrentIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = authz::require_role(parts.extensions.get::<IdentitySummary>(), &Role::ALL)?;
        Ok(Self(identity.clone()))
    }
}

/// The authenticated caller, who must be an administrator.
#[derive(Debug, Clone)]
pub struct AdminIdentity(pub IdentitySummary);

impl<S: Send + Sync> FromRequestParts<S> for AdminIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = authz::require_role(
            parts.extensions.get::<IdentitySummary>(),
            &[Role::Administrator],
        )?;
        Ok(Self(identity.clone()))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;
    use carehub_core::auth::AuthError;
    use uuid::Uuid;

    use super::*;

    fn parts_with(identity: Option<IdentitySummary>) -> Parts {
        let (mut parts, _) = Request::new(()).into_parts();
        if let Some(identity) = identity {
            parts.extensions.insert(identity);
        }
        parts
    }

    fn summary(role: Role) -> IdentitySummary {
        IdentitySummary {
            id: Uuid::new_v4(),
            email: "x@example.com".into(),
            role,
            facility_id: None,
        }
    }

    #[tokio::test]
    async fn missing_identity_is_unauthenticated() {
        let mut parts = parts_with(None);
        let err = CurrentIdentity::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::Unauthenticated)));
    }

    #[tokio::test]
    async fn admin_extractor_rejects_other_roles() {
        let mut parts = parts_with(Some(summary(Role::Supervisor)));
        let err = AdminIdentity::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::InsufficientRole)));

        let mut parts = parts_with(Some(summary(Role::Administrator)));
        assert!(AdminIdentity::from_request_parts(&mut parts, &()).await.is_ok());
    }
}
