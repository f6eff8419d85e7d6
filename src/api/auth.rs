//! Authentication routes: login, logout, verify, and admin registration.

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;

use crate::auth::Role;
use crate::store::NewUser;

use super::types::{Ack, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse, UserInfo, UserResponse};
use super::{ApiError, AppState, bearer_token};

/// `POST /api/auth/login` → verifies credentials and issues a bearer token.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    if request.username.is_empty() || request.password.is_empty() {
        return Err(ApiError::bad_request("Username and password required"));
    }

    let store = state.store.lock().await;
    let user = store
        .user_by_username(&request.username)
        .filter(|u| u.is_active)
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    if !user.password.verify(&request.password) {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let token = state.tokens.issue(user.id);
    Ok(Json(LoginResponse {
        success: true,
        user: UserInfo::from(user),
        token,
    }))
}

/// `POST /api/auth/logout` → revokes the presented token, if any.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Json<Ack> {
    if let Some(token) = bearer_token(&headers) {
        state.tokens.revoke(token);
    }
    Json(Ack::new("Logged out successfully"))
}

/// `GET /api/auth/verify` → resolves the bearer token back to its account.
pub async fn verify(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserResponse>, ApiError> {
    let token = bearer_token(&headers).ok_or_else(|| ApiError::unauthorized("No token provided"))?;
    let user_id = state
        .tokens
        .resolve(token)
        .ok_or_else(|| ApiError::unauthorized("Invalid token"))?;

    let store = state.store.lock().await;
    let user = store
        .user(user_id)
        .filter(|u| u.is_active)
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(UserResponse {
        success: true,
        user: UserInfo::from(user),
    }))
}

/// `POST /api/auth/register` → creates an account. Requires an admin token.
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let token = bearer_token(&headers).ok_or_else(|| ApiError::unauthorized("No token provided"))?;
    let user_id = state
        .tokens
        .resolve(token)
        .ok_or_else(|| ApiError::unauthorized("Invalid token"))?;

    let mut store = state.store.lock().await;
    let is_admin = store
        .user(user_id)
        .is_some_and(|u| u.is_active && u.role == Role::Admin);
    if !is_admin {
        return Err(ApiError::forbidden("Admin privileges required"));
    }

    if request.username.is_empty() || request.password.is_empty() || request.name.is_empty() {
        return Err(ApiError::bad_request(
            "Username, password, and name are required",
        ));
    }

    let new_id = store
        .add_user(NewUser {
            username: request.username,
            email: request.email,
            password: request.password,
            role: request.role,
            name: request.name,
            assigned_unit_id: request.assigned_unit_id,
        })
        .map_err(|err| match err {
            crate::store::StoreError::Conflict(_) => {
                ApiError::conflict("Username or email already exists")
            }
            other => other.into(),
        })?;

    Ok(Json(RegisterResponse {
        success: true,
        message: "User created successfully",
        user_id: new_id,
    }))
}
