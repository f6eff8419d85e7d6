//! System routes: the singleton state, buildings, settings, and the
//! dashboard summary.

use axum::extract::{Extension, Path, State};
use axum::Json;

use crate::store::BuildingUpdate;
use crate::state::StateUpdate;

use super::types::{
    Ack, BuildingsResponse, SettingsResponse, SettingsRow, StateResponse, Summary, SummaryResponse,
};
use super::{ApiError, AppState, CurrentUser};

/// `GET /api/system/state` → the singleton state; 404 if unprovisioned.
pub async fn get_state(State(state): State<AppState>) -> Result<Json<StateResponse>, ApiError> {
    let store = state.store.lock().await;
    let system = store
        .system_state()
        .ok_or_else(|| ApiError::not_found("System state not found"))?;
    Ok(Json(StateResponse {
        success: true,
        state: system.clone(),
    }))
}

/// `PUT /api/system/state` → applies a validated partial update.
///
/// Returns a bare acknowledgement, no echo of the resulting state; the
/// dashboard re-reads on its next poll.
pub async fn put_state(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(update): Json<StateUpdate>,
) -> Result<Json<Ack>, ApiError> {
    if !current.role.can_operate() {
        return Err(ApiError::forbidden("Insufficient permissions"));
    }
    let mut store = state.store.lock().await;
    store.update_state(&update)?;
    Ok(Json(Ack::new("System state updated successfully")))
}

/// `GET /api/system/buildings` → active buildings, ordered by name.
pub async fn get_buildings(
    State(state): State<AppState>,
) -> Result<Json<BuildingsResponse>, ApiError> {
    let store = state.store.lock().await;
    let buildings: Vec<_> = store
        .buildings()
        .into_iter()
        .filter(|b| b.is_active)
        .cloned()
        .collect();
    let total = buildings.len();
    Ok(Json(BuildingsResponse {
        success: true,
        buildings,
        total,
    }))
}

/// `PUT /api/system/buildings/{id}` → replaces a building's tunable fields.
pub async fn put_building(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(update): Json<BuildingUpdate>,
) -> Result<Json<Ack>, ApiError> {
    if !current.role.can_operate() {
        return Err(ApiError::forbidden("Insufficient permissions"));
    }
    let mut store = state.store.lock().await;
    store.update_building(&id, update)?;
    Ok(Json(Ack::new("Building updated successfully")))
}

/// `GET /api/system/settings` → active-entity counts per table.
pub async fn get_settings(
    State(state): State<AppState>,
) -> Result<Json<SettingsResponse>, ApiError> {
    let store = state.store.lock().await;
    let (buildings, energy_systems, users) = store.settings_counts();
    Ok(Json(SettingsResponse {
        success: true,
        settings: vec![
            SettingsRow {
                kind: "buildings",
                count: buildings,
            },
            SettingsRow {
                kind: "energy_systems",
                count: energy_systems,
            },
            SettingsRow {
                kind: "users",
                count: users,
            },
        ],
    }))
}

/// `GET /api/system/summary` → display-ready derived values; 404 if
/// unprovisioned.
pub async fn get_summary(State(state): State<AppState>) -> Result<Json<SummaryResponse>, ApiError> {
    let store = state.store.lock().await;
    let system = store
        .system_state()
        .ok_or_else(|| ApiError::not_found("System state not found"))?;
    Ok(Json(SummaryResponse {
        success: true,
        summary: Summary {
            time: system.clock_label(),
            weather: system.weather,
            weather_icon: system.weather.icon(),
            battery_percent: system.battery_percent(),
            hospital_status: system.hospital.status_label(),
            is_playing: system.is_playing,
        },
    }))
}
