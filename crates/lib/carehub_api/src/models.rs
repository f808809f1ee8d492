//! Request and response shapes for the HTTP surface.
//!
//! Every response body is an [`ApiResponse`] envelope. Field names are
//! camelCase on the wire.

use carehub_core::auth::session::Session;
use carehub_core::authz::Role;
use carehub_core::models::auth::{Facility, Identity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Uniform response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    /// Stable machine-readable failure reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            errors: None,
            code: None,
        }
    }

    pub fn ok_with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::ok(data)
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
            errors: None,
            code: None,
        }
    }

    pub fn failure(code: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
            errors: None,
            code: Some(code.to_string()),
        }
    }
}

/// An identity as returned to clients. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub facility_id: Option<Uuid>,
    pub is_active: bool,
    pub email_verified: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&Identity> for UserView {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id,
            email: identity.email.clone(),
            name: identity.name.clone(),
            role: identity.role,
            facility_id: identity.facility_id,
            is_active: identity.is_active,
            email_verified: identity.email_verified,
            last_login_at: identity.last_login_at,
            created_at: identity.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub user: UserView,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub facility_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub user: UserView,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    pub expires_in: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDetails {
    pub permissions: Vec<String>,
    pub facility: Option<Facility>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub user: UserView,
    pub profile: ProfileDetails,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    pub session: Session,
}

// ---------------------------------------------------------------------------
// Passwords
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Only populated in development mode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

// ---------------------------------------------------------------------------
// Identity administration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsersResponse {
    pub users: Vec<UserView>,
}

/// `null` (or an absent field) removes the facility association.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetFacilityRequest {
    #[serde(default)]
    pub facility_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_omits_absent_fields() {
        let body = serde_json::to_value(ApiResponse::<()>::message("Logged out")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "success": true, "message": "Logged out" })
        );
    }

    #[test]
    fn requests_use_camel_case() {
        let req: ResetPasswordRequest =
            serde_json::from_str(r#"{"token":"t","newPassword":"p4ssword"}"#).unwrap();
        assert_eq!(req.new_password, "p4ssword");

        let req: RegisterRequest = serde_json::from_str(
            r#"{"email":"a@b.c","password":"p","name":"A","role":"caregiver"}"#,
        )
        .unwrap();
        assert!(req.facility_id.is_none());
    }

    #[test]
    fn user_view_hides_password_hash() {
        let identity = Identity {
            id: Uuid::new_v4(),
            email: "a@b.c".into(),
            password_hash: "$2b$12$secret".into(),
            name: "A".into(),
            role: Role::Physician,
            facility_id: None,
            is_active: true,
            email_verified: false,
            failed_login_attempts: 0,
            locked_until: None,
            last_login_at: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&UserView::from(&identity)).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("\"role\":\"physician\""));
    }
}
