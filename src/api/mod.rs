//! REST API for the city dashboard.
//!
//! Public surface: `/api/health` and `/api/auth/*`. Everything else sits
//! behind the bearer-token middleware. Handlers live in one module per route
//! area, DTOs in [`types`].

mod auth;
mod energy;
mod error;
mod system;
pub mod types;
mod users;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;

use crate::auth::{Role, TokenStore};
use crate::store::SharedStore;

pub use error::ApiError;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The single-writer city store.
    pub store: SharedStore,
    /// Bearer-token sessions.
    pub tokens: Arc<TokenStore>,
}

/// The authenticated principal, attached to requests by the auth middleware.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser {
    pub id: u64,
    pub role: Role,
}

/// Builds the axum router with all API routes.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route(
            "/api/system/state",
            get(system::get_state).put(system::put_state),
        )
        .route("/api/system/buildings", get(system::get_buildings))
        .route("/api/system/buildings/{id}", put(system::put_building))
        .route("/api/system/settings", get(system::get_settings))
        .route("/api/system/summary", get(system::get_summary))
        .route("/api/energy/systems", get(energy::get_systems))
        .route("/api/energy/systems/{id}", put(energy::put_system))
        .route("/api/energy/history", get(energy::get_history))
        .route("/api/energy/record", post(energy::post_record))
        .route("/api/energy/stats", get(energy::get_stats))
        .route("/api/energy/efficiency", get(energy::get_efficiency))
        .route("/api/users", get(users::list_users))
        .route(
            "/api/users/{id}",
            get(users::get_user)
                .put(users::put_user)
                .delete(users::delete_user),
        )
        .route("/api/users/{id}/password", post(users::change_password))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/verify", get(auth::verify))
        .merge(protected)
        .with_state(state)
}

/// Binds to the given address and serves the API until `shutdown` resolves.
pub async fn serve(
    state: AppState,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

/// `GET /api/health` → service liveness, public.
async fn health() -> Json<types::HealthResponse> {
    Json(types::HealthResponse {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Extracts the bearer token from an `Authorization` header.
pub(crate) fn bearer_token(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

/// Middleware guarding the protected routes: resolves the bearer token to an
/// active account and attaches [`CurrentUser`] to the request.
async fn require_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let Some(token) = bearer_token(request.headers()) else {
        return ApiError::unauthorized("No token provided").into_response();
    };
    let Some(user_id) = state.tokens.resolve(token) else {
        return ApiError::unauthorized("Invalid token").into_response();
    };

    let current = {
        let store = state.store.lock().await;
        match store.user(user_id) {
            Some(user) if user.is_active => CurrentUser {
                id: user.id,
                role: user.role,
            },
            _ => return ApiError::unauthorized("Invalid token").into_response(),
        }
    };

    request.extensions_mut().insert(current);
    next.run(request).await
}
