//! Authentication request handlers.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;

use crate::AppState;
use crate::error::AppResult;
use crate::extract::{AdminIdentity, ApiJson, CurrentIdentity};
use crate::models::{
    ApiResponse, ChangePasswordRequest, ForgotPasswordRequest, ForgotPasswordResponse,
    LoginRequest, LoginResponse, LogoutRequest, ProfileResponse, RefreshRequest,
    RefreshResponse, RegisterRequest, ResetPasswordRequest, SessionResponse, UserResponse,
    UserView,
};
use crate::services::auth;

type Reply<T> = AppResult<Json<ApiResponse<T>>>;

/// Same wording for every email so responses do not reveal which exist.
const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account with that email exists, a password reset link has been sent";

/// `POST /login` — authenticate with email + password.
pub async fn login_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Reply<LoginResponse> {
    let resp = auth::login(&state, &body.email, &body.password).await?;
    Ok(Json(ApiResponse::ok_with_message("Login successful", resp)))
}

/// `POST /register` — create an identity. Administrators only.
pub async fn register_handler(
    State(state): State<AppState>,
    AdminIdentity(_admin): AdminIdentity,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<UserResponse>>)> {
    let identity = auth::register(&state, body).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(
            "User registered successfully",
            UserResponse {
                user: UserView::from(&identity),
            },
        )),
    ))
}

/// `POST /refresh-token` — exchange a refresh token for a new access token.
pub async fn refresh_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RefreshRequest>,
) -> Reply<RefreshResponse> {
    let resp = auth::refresh(&state, &body.refresh_token).await?;
    Ok(Json(ApiResponse::ok(resp)))
}

/// `POST /logout` — drop the session named by the refresh token. Always 200,
/// even for a missing or malformed body.
pub async fn logout_handler(State(state): State<AppState>, body: Bytes) -> Json<ApiResponse<()>> {
    let body: LogoutRequest = serde_json::from_slice(&body).unwrap_or_default();
    auth::logout(&state, body.refresh_token.as_deref()).await;
    Json(ApiResponse::message("Logged out successfully"))
}

/// `GET /profile` — the caller's identity, permissions and facility.
pub async fn profile_handler(
    State(state): State<AppState>,
    CurrentIdentity(caller): CurrentIdentity,
) -> Reply<ProfileResponse> {
    let resp = auth::profile(&state, &caller).await?;
    Ok(Json(ApiResponse::ok(resp)))
}

/// `GET /session` — metadata of the caller's current session.
pub async fn session_handler(
    State(state): State<AppState>,
    CurrentIdentity(caller): CurrentIdentity,
) -> Reply<SessionResponse> {
    let session = auth::current_session(&state, &caller).await?;
    Ok(Json(ApiResponse::ok(SessionResponse { session })))
}

/// `POST /forgot-password` — issue a reset token if the email is known.
pub async fn forgot_password_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ForgotPasswordRequest>,
) -> Reply<ForgotPasswordResponse> {
    let reset_token = auth::forgot_password(&state, &body.email).await?;
    Ok(Json(ApiResponse::ok_with_message(
        FORGOT_PASSWORD_MESSAGE,
        ForgotPasswordResponse { reset_token },
    )))
}

/// `POST /reset-password` — redeem a reset token.
pub async fn reset_password_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ResetPasswordRequest>,
) -> Reply<()> {
    auth::reset_password(&state, &body.token, &body.new_password).await?;
    Ok(Json(ApiResponse::message("Password reset successfully")))
}

/// `POST /change-password` — replace the caller's password.
pub async fn change_password_handler(
    State(state): State<AppState>,
    CurrentIdentity(caller): CurrentIdentity,
    ApiJson(body): ApiJson<ChangePasswordRequest>,
) -> Reply<()> {
    auth::change_password(&state, &caller, &body.current_password, &body.new_password).await?;
    Ok(Json(ApiResponse::message("Password changed successfully")))
}
