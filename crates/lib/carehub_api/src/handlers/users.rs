//! Identity administration handlers.

use axum::Json;
use axum::extract::State;
use carehub_core::authz::{derive_scope, require_permission};
use uuid::Uuid;

use crate::AppState;
use crate::error::AppResult;
use crate::extract::{AdminIdentity, ApiJson, ApiPath, CurrentIdentity};
use crate::models::{ApiResponse, SetFacilityRequest, UserResponse, UserView, UsersResponse};
use crate::services::users;

/// Permission needed to list identities.
pub const USERS_READ: &str = "users.read";

/// `GET /users` — identities within the caller's facility scope.
///
/// The permission check runs before the scope is resolved.
pub async fn list_users_handler(
    State(state): State<AppState>,
    CurrentIdentity(caller): CurrentIdentity,
) -> AppResult<Json<ApiResponse<UsersResponse>>> {
    require_permission(Some(&caller), &state.config.role_permissions, USERS_READ)?;
    let scope = derive_scope(&caller, state.store.as_ref(), state.config.scope_fallback).await?;
    let identities = users::list_users(&state, scope).await?;
    Ok(Json(ApiResponse::ok(UsersResponse {
        users: identities.iter().map(UserView::from).collect(),
    })))
}

/// `GET /users/{id}` — one identity; self or administrator.
pub async fn get_user_handler(
    State(state): State<AppState>,
    CurrentIdentity(caller): CurrentIdentity,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<ApiResponse<UserResponse>>> {
    let identity = users::get_user(&state, &caller, id).await?;
    Ok(Json(ApiResponse::ok(UserResponse {
        user: UserView::from(&identity),
    })))
}

/// `PATCH /users/{id}/facility` — assign or clear a facility. Administrators only.
pub async fn set_facility_handler(
    State(state): State<AppState>,
    AdminIdentity(admin): AdminIdentity,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<SetFacilityRequest>,
) -> AppResult<Json<ApiResponse<UserResponse>>> {
    let identity = users::set_facility(&state, &admin, id, body.facility_id).await?;
    Ok(Json(ApiResponse::ok_with_message(
        "Facility updated",
        UserResponse {
            user: UserView::from(&identity),
        },
    )))
}

/// `DELETE /users/{id}` — soft delete. Administrators only.
pub async fn deactivate_user_handler(
    State(state): State<AppState>,
    AdminIdentity(admin): AdminIdentity,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    users::deactivate_user(&state, &admin, id).await?;
    Ok(Json(ApiResponse::message("User deactivated")))
}
