//! Request and response types for the dashboard API.
//!
//! Response field names mirror the dashboard contract: state and summary
//! payloads are camelCase, table-backed listings keep their column names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::{Role, User};
use crate::history::{DayEfficiency, EnergyHistoryRecord};
use crate::inventory::{Building, EnergySystem, SystemKind};
use crate::state::{SystemState, Weather};

/// `GET /api/health` response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub version: &'static str,
}

/// Generic `{ success, message }` acknowledgement.
#[derive(Debug, Serialize)]
pub struct Ack {
    pub success: bool,
    pub message: &'static str,
}

impl Ack {
    pub fn new(message: &'static str) -> Self {
        Self {
            success: true,
            message,
        }
    }
}

// --- auth ---

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Account fields safe to expose; the password hash never leaves the store.
#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub id: u64,
    pub username: String,
    pub email: Option<String>,
    pub role: Role,
    pub name: String,
    pub assigned_unit_id: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
            name: user.name.clone(),
            assigned_unit_id: user.assigned_unit_id.clone(),
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: UserInfo,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub success: bool,
    pub user: UserInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub password: String,
    #[serde(default = "default_register_role")]
    pub role: Role,
    pub name: String,
    #[serde(default)]
    pub assigned_unit_id: Option<String>,
}

fn default_register_role() -> Role {
    Role::Member
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub message: &'static str,
    #[serde(rename = "userId")]
    pub user_id: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChangeRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub success: bool,
    pub users: Vec<UserInfo>,
    pub total: usize,
}

// --- system ---

#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub success: bool,
    pub state: SystemState,
}

#[derive(Debug, Serialize)]
pub struct BuildingsResponse {
    pub success: bool,
    pub buildings: Vec<Building>,
    pub total: usize,
}

/// One row of the settings overview: an entity class and its active count.
#[derive(Debug, Serialize)]
pub struct SettingsRow {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub success: bool,
    pub settings: Vec<SettingsRow>,
}

/// Display-ready values derived from the singleton state. Pure presentation:
/// nothing here feeds back into the store.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// `HH:MM` clock label.
    pub time: String,
    pub weather: Weather,
    pub weather_icon: &'static str,
    pub battery_percent: f64,
    pub hospital_status: &'static str,
    pub is_playing: bool,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub success: bool,
    pub summary: Summary,
}

// --- energy ---

#[derive(Debug, Serialize)]
pub struct EnergySystemsResponse {
    pub success: bool,
    pub systems: Vec<EnergySystem>,
    pub total: usize,
}

/// Query parameters for `GET /api/energy/history`.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Maximum records to return (default 50).
    pub limit: Option<usize>,
    /// Window size in hours (default 24).
    pub hours: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub success: bool,
    pub history: Vec<EnergyHistoryRecord>,
    pub total: usize,
}

/// `POST /api/energy/record` body. Short field names per the dashboard's
/// recording call; mapped onto the full record server-side.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RecordRequest {
    /// Epoch milliseconds, caller-supplied.
    pub timestamp: i64,
    pub consumption: f64,
    pub solar: f64,
    pub wind: f64,
    pub battery: f64,
    pub net_grid: f64,
    pub weather: Weather,
}

impl From<RecordRequest> for EnergyHistoryRecord {
    fn from(req: RecordRequest) -> Self {
        Self {
            timestamp_ms: req.timestamp,
            total_consumption_kw: req.consumption,
            solar_output_kw: req.solar,
            wind_output_kw: req.wind,
            battery_level_kw: req.battery,
            net_grid_load_kw: req.net_grid,
            weather_condition: req.weather,
        }
    }
}

/// Query parameters for `GET /api/energy/efficiency`.
#[derive(Debug, Deserialize)]
pub struct EfficiencyQuery {
    /// Trailing window in days (default 7).
    pub days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct EfficiencyResponse {
    pub success: bool,
    pub efficiency: Vec<DayEfficiency>,
    pub period: String,
}

/// Current-state slice of the stats payload.
#[derive(Debug, Serialize)]
pub struct CurrentStats {
    pub time: u16,
    pub weather: Weather,
    #[serde(rename = "batteryLevel")]
    pub battery_level: f64,
}

/// Latest-record slice of the stats payload; zeroed when the log is empty.
#[derive(Debug, Default, Serialize)]
pub struct LatestStats {
    pub total_consumption_kw: f64,
    pub solar_output_kw: f64,
    pub wind_output_kw: f64,
    pub net_grid_load_kw: f64,
}

impl From<&EnergyHistoryRecord> for LatestStats {
    fn from(record: &EnergyHistoryRecord) -> Self {
        Self {
            total_consumption_kw: record.total_consumption_kw,
            solar_output_kw: record.solar_output_kw,
            wind_output_kw: record.wind_output_kw,
            net_grid_load_kw: record.net_grid_load_kw,
        }
    }
}

/// Per-kind totals over online systems.
#[derive(Debug, Serialize)]
pub struct CapacityRow {
    #[serde(rename = "type")]
    pub kind: SystemKind,
    pub total_capacity: f64,
    pub total_output: f64,
}

#[derive(Debug, Serialize)]
pub struct Stats {
    pub current: CurrentStats,
    pub latest: LatestStats,
    pub capacity: Vec<CapacityRow>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub success: bool,
    pub stats: Stats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_request_maps_onto_full_record() {
        let req: RecordRequest = serde_json::from_str(
            r#"{
                "timestamp": 1000,
                "consumption": 900.0,
                "solar": 250.0,
                "wind": 150.0,
                "battery": 2400.0,
                "netGrid": 500.0,
                "weather": "rainy"
            }"#,
        )
        .unwrap();
        let record: EnergyHistoryRecord = req.into();
        assert_eq!(record.timestamp_ms, 1000);
        assert_eq!(record.total_consumption_kw, 900.0);
        assert_eq!(record.net_grid_load_kw, 500.0);
        assert_eq!(record.weather_condition, Weather::Rainy);
    }

    #[test]
    fn record_request_requires_every_field() {
        let err = serde_json::from_str::<RecordRequest>(r#"{"timestamp": 1000}"#);
        assert!(err.is_err());
    }

    #[test]
    fn register_role_defaults_to_member() {
        let req: RegisterRequest = serde_json::from_str(
            r#"{"username": "op", "password": "pw", "name": "Operator"}"#,
        )
        .unwrap();
        assert_eq!(req.role, Role::Member);
        assert!(req.email.is_none());
    }

    #[test]
    fn user_info_omits_password_material() {
        let user = User {
            id: 1,
            username: "admin".to_string(),
            email: None,
            password: crate::auth::PasswordHash::new("pw"),
            role: Role::Admin,
            name: "Admin".to_string(),
            assigned_unit_id: None,
            is_active: true,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(UserInfo::from(&user)).unwrap();
        let obj = json.as_object().unwrap();
        assert!(!obj.contains_key("password"));
        assert!(obj.contains_key("created_at"));
    }
}
