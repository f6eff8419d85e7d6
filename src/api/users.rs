//! User management routes. Listing and editing are admin-only; an account
//! may read itself and rotate its own password.

use axum::Json;
use axum::extract::{Extension, Path, State};

use crate::auth::Role;
use crate::store::UserUpdate;

use super::types::{Ack, PasswordChangeRequest, UserInfo, UserResponse, UsersResponse};
use super::{ApiError, AppState, CurrentUser};

fn require_admin(current: CurrentUser) -> Result<(), ApiError> {
    if current.role != Role::Admin {
        return Err(ApiError::forbidden("Admin privileges required"));
    }
    Ok(())
}

/// `GET /api/users` → all accounts, newest first. Admin only.
pub async fn list_users(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<UsersResponse>, ApiError> {
    require_admin(current)?;
    let store = state.store.lock().await;
    let users: Vec<UserInfo> = store.users().into_iter().map(UserInfo::from).collect();
    let total = users.len();
    Ok(Json(UsersResponse {
        success: true,
        users,
        total,
    }))
}

/// `GET /api/users/{id}` → one account. Admin, or the account itself.
pub async fn get_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<u64>,
) -> Result<Json<UserResponse>, ApiError> {
    if current.role != Role::Admin && current.id != id {
        return Err(ApiError::forbidden("Admin privileges required"));
    }
    let store = state.store.lock().await;
    let user = store
        .user(id)
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(UserResponse {
        success: true,
        user: UserInfo::from(user),
    }))
}

/// `PUT /api/users/{id}` → replaces the editable profile fields. Admin only.
pub async fn put_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<u64>,
    Json(update): Json<UserUpdate>,
) -> Result<Json<Ack>, ApiError> {
    require_admin(current)?;
    let mut store = state.store.lock().await;
    store.update_user(id, update)?;
    Ok(Json(Ack::new("User updated successfully")))
}

/// `DELETE /api/users/{id}` → removes an account. Admin only.
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<u64>,
) -> Result<Json<Ack>, ApiError> {
    require_admin(current)?;
    let mut store = state.store.lock().await;
    store.delete_user(id)?;
    Ok(Json(Ack::new("User deleted successfully")))
}

/// `POST /api/users/{id}/password` → rotates a password after verifying the
/// current one. Admin, or the account itself.
pub async fn change_password(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<u64>,
    Json(request): Json<PasswordChangeRequest>,
) -> Result<Json<Ack>, ApiError> {
    if current.role != Role::Admin && current.id != id {
        return Err(ApiError::forbidden("Admin privileges required"));
    }
    if request.current_password.is_empty() || request.new_password.is_empty() {
        return Err(ApiError::bad_request(
            "Current and new passwords are required",
        ));
    }

    let mut store = state.store.lock().await;
    let user = store
        .user(id)
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    if !user.password.verify(&request.current_password) {
        return Err(ApiError::unauthorized("Current password is incorrect"));
    }
    store.set_user_password(id, &request.new_password)?;
    Ok(Json(Ack::new("Password changed successfully")))
}
