//! Energy routes: systems inventory, the history log, stats, and per-day
//! efficiency aggregates.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use chrono::Utc;

use crate::state::Weather;
use crate::store::EnergySystemUpdate;

use super::types::{
    Ack, CapacityRow, CurrentStats, EfficiencyQuery, EfficiencyResponse, EnergySystemsResponse,
    HistoryQuery, HistoryResponse, LatestStats, RecordRequest, Stats, StatsResponse,
};
use super::{ApiError, AppState, CurrentUser};

const DEFAULT_HISTORY_LIMIT: usize = 50;
const DEFAULT_HISTORY_HOURS: i64 = 24;
const DEFAULT_EFFICIENCY_DAYS: i64 = 7;

/// `GET /api/energy/systems` → all systems, ordered by kind then name.
pub async fn get_systems(
    State(state): State<AppState>,
) -> Result<Json<EnergySystemsResponse>, ApiError> {
    let store = state.store.lock().await;
    let systems: Vec<_> = store.energy_systems().into_iter().cloned().collect();
    let total = systems.len();
    Ok(Json(EnergySystemsResponse {
        success: true,
        systems,
        total,
    }))
}

/// `PUT /api/energy/systems/{id}` → replaces a system's operating point.
pub async fn put_system(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(update): Json<EnergySystemUpdate>,
) -> Result<Json<Ack>, ApiError> {
    if !current.role.can_operate() {
        return Err(ApiError::forbidden("Insufficient permissions"));
    }
    let mut store = state.store.lock().await;
    store.update_energy_system(&id, update)?;
    Ok(Json(Ack::new("Energy system updated successfully")))
}

/// `GET /api/energy/history?limit=N&hours=H` → recent records, newest first.
pub async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let hours = query.hours.unwrap_or(DEFAULT_HISTORY_HOURS);
    let cutoff_ms = Utc::now().timestamp_millis() - hours.saturating_mul(3_600_000);

    let store = state.store.lock().await;
    let history = store.history().recent(limit, cutoff_ms);
    let total = history.len();
    Ok(Json(HistoryResponse {
        success: true,
        history,
        total,
    }))
}

/// `POST /api/energy/record` → appends one immutable history record.
pub async fn post_record(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(request): Json<RecordRequest>,
) -> Result<Json<Ack>, ApiError> {
    if !current.role.can_operate() {
        return Err(ApiError::forbidden("Insufficient permissions"));
    }
    let mut store = state.store.lock().await;
    store.record_history(request.into())?;
    Ok(Json(Ack::new("Energy data recorded successfully")))
}

/// `GET /api/energy/stats` → current state, latest record, and per-kind
/// online capacity totals.
pub async fn get_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let store = state.store.lock().await;

    // Falls back to the provisioning defaults when the state row is absent,
    // so the dashboard always has something to draw.
    let current = match store.system_state() {
        Some(system) => CurrentStats {
            time: system.time_minutes,
            weather: system.weather,
            battery_level: system.battery_level_kw,
        },
        None => CurrentStats {
            time: 720,
            weather: Weather::Sunny,
            battery_level: 2500.0,
        },
    };

    let latest = store
        .history()
        .latest()
        .map(LatestStats::from)
        .unwrap_or_default();

    let mut totals: BTreeMap<crate::inventory::SystemKind, (f64, f64)> = BTreeMap::new();
    for system in store.energy_systems() {
        if system.status == crate::inventory::SystemStatus::Online {
            let entry = totals.entry(system.kind).or_insert((0.0, 0.0));
            entry.0 += system.capacity_kw;
            entry.1 += system.current_output_kw;
        }
    }
    let capacity = totals
        .into_iter()
        .map(|(kind, (total_capacity, total_output))| CapacityRow {
            kind,
            total_capacity,
            total_output,
        })
        .collect();

    Ok(Json(StatsResponse {
        success: true,
        stats: Stats {
            current,
            latest,
            capacity,
        },
    }))
}

/// `GET /api/energy/efficiency?days=D` → per-day averages over the trailing
/// window, newest day first.
pub async fn get_efficiency(
    State(state): State<AppState>,
    Query(query): Query<EfficiencyQuery>,
) -> Result<Json<EfficiencyResponse>, ApiError> {
    let days = query.days.unwrap_or(DEFAULT_EFFICIENCY_DAYS).max(0);

    let store = state.store.lock().await;
    let efficiency = store.history().daily_efficiency(days, Utc::now());
    Ok(Json(EfficiencyResponse {
        success: true,
        efficiency,
        period: format!("{days} days"),
    }))
}
