//! Shared helpers for the API integration suites.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::Duration;
use serde_json::Value;
use tower::util::ServiceExt;

use city_bms::api::{AppState, router};
use city_bms::auth::TokenStore;
use city_bms::store::Store;

pub const ADMIN_PASSWORD: &str = "admin-test-pw";
pub const GUEST_PASSWORD: &str = "guest-test-pw";

/// A router over a provisioned in-memory store.
pub fn app() -> Router {
    let mut store = Store::in_memory();
    store
        .ensure_provisioned(ADMIN_PASSWORD, GUEST_PASSWORD)
        .expect("provisioning should succeed");
    router(AppState {
        store: store.into_shared(),
        tokens: Arc::new(TokenStore::new(Duration::hours(24))),
    })
}

/// A router over an empty store (no state row, no accounts).
pub fn empty_app() -> Router {
    router(AppState {
        store: Store::in_memory().into_shared(),
        tokens: Arc::new(TokenStore::new(Duration::hours(24))),
    })
}

/// A router over a store that has an admin account but no state row:
/// the "uninitialized" shape the 404 contract describes.
pub fn unprovisioned_app() -> Router {
    let mut store = Store::in_memory();
    store
        .add_user(city_bms::store::NewUser {
            username: "admin".to_string(),
            email: None,
            password: ADMIN_PASSWORD.to_string(),
            role: city_bms::auth::Role::Admin,
            name: "Admin".to_string(),
            assigned_unit_id: None,
        })
        .expect("seed account should insert");
    router(AppState {
        store: store.into_shared(),
        tokens: Arc::new(TokenStore::new(Duration::hours(24))),
    })
}

/// Sends one request and returns status plus parsed JSON body.
pub async fn send(
    app: &Router,
    method: &str,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .expect("request should build"),
        None => builder.body(Body::empty()).expect("request should build"),
    };

    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("request should not fail at the transport level");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

/// Logs in and returns the issued bearer token.
pub async fn login(app: &Router, username: &str, password: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/auth/login",
        None,
        Some(serde_json::json!({ "username": username, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    body["token"]
        .as_str()
        .expect("login response should carry a token")
        .to_string()
}

/// Logs in as the provisioned admin.
pub async fn admin_token(app: &Router) -> String {
    login(app, "admin", ADMIN_PASSWORD).await
}

/// Logs in as the provisioned guest.
pub async fn guest_token(app: &Router) -> String {
    login(app, "guest", GUEST_PASSWORD).await
}
