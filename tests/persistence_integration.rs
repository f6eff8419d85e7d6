//! Store persistence round trips: snapshot recovery, history replay, and
//! tamper detection.

use serde_json::json;
use tempfile::tempdir;

use city_bms::history::EnergyHistoryRecord;
use city_bms::state::{StateUpdate, Weather};
use city_bms::store::{Store, StoreError};

fn record(timestamp_ms: i64) -> EnergyHistoryRecord {
    EnergyHistoryRecord {
        timestamp_ms,
        total_consumption_kw: 820.0,
        solar_output_kw: 280.0,
        wind_output_kw: 140.0,
        battery_level_kw: 2400.0,
        net_grid_load_kw: 400.0,
        weather_condition: Weather::Cloudy,
    }
}

#[test]
fn state_and_inventory_survive_a_restart() {
    let dir = tempdir().unwrap();

    {
        let mut store = Store::open(dir.path()).unwrap();
        assert!(store.ensure_provisioned("admin-pw", "guest-pw").unwrap());
        store
            .update_state(&StateUpdate {
                weather: Some(Weather::Stormy),
                wind_flux: Some(0.9),
                ..StateUpdate::default()
            })
            .unwrap();
    }

    let store = Store::open(dir.path()).unwrap();
    let state = store.system_state().expect("state should be recovered");
    assert_eq!(state.weather, Weather::Stormy);
    assert_eq!(state.wind_flux, 0.9);
    assert_eq!(store.buildings().len(), 4);
    assert_eq!(store.energy_systems().len(), 4);

    // Accounts and their credentials survive too.
    let admin = store.user_by_username("admin").unwrap();
    assert!(admin.password.verify("admin-pw"));
}

#[test]
fn provisioning_does_not_rerun_after_restart() {
    let dir = tempdir().unwrap();
    {
        let mut store = Store::open(dir.path()).unwrap();
        assert!(store.ensure_provisioned("a", "g").unwrap());
    }
    let mut store = Store::open(dir.path()).unwrap();
    assert!(!store.ensure_provisioned("a", "g").unwrap());
    assert_eq!(store.users().len(), 2);
}

#[test]
fn history_replays_in_append_order() {
    let dir = tempdir().unwrap();

    {
        let mut store = Store::open(dir.path()).unwrap();
        store.ensure_provisioned("a", "g").unwrap();
        for ms in [5, 3, 9] {
            store.record_history(record(ms)).unwrap();
        }
    }

    let store = Store::open(dir.path()).unwrap();
    assert_eq!(store.history().len(), 3);
    let stamps: Vec<i64> = store.history().iter().map(|r| r.timestamp_ms).collect();
    assert_eq!(stamps, vec![5, 3, 9]);
    // Queries still order by timestamp, not append order.
    assert_eq!(store.history().latest().unwrap().timestamp_ms, 9);
}

#[test]
fn registered_users_survive_a_restart() {
    let dir = tempdir().unwrap();
    let id = {
        let mut store = Store::open(dir.path()).unwrap();
        store.ensure_provisioned("a", "g").unwrap();
        store
            .add_user(city_bms::store::NewUser {
                username: "op".to_string(),
                email: None,
                password: "op-pw".to_string(),
                role: city_bms::auth::Role::Member,
                name: "Operator".to_string(),
                assigned_unit_id: None,
            })
            .unwrap()
    };

    let store = Store::open(dir.path()).unwrap();
    let user = store.user(id).unwrap();
    assert_eq!(user.username, "op");
    assert!(user.password.verify("op-pw"));
}

#[test]
fn tampered_snapshot_is_rejected_on_open() {
    let dir = tempdir().unwrap();
    {
        let mut store = Store::open(dir.path()).unwrap();
        store.ensure_provisioned("a", "g").unwrap();
    }

    let snapshot_path = dir.path().join("snapshot.json");
    let mut envelope: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&snapshot_path).unwrap()).unwrap();
    envelope["document"]["state"]["bessCurrent"] = json!(4999.0);
    std::fs::write(&snapshot_path, serde_json::to_vec(&envelope).unwrap()).unwrap();

    let err = Store::open(dir.path()).unwrap_err();
    assert!(matches!(err, StoreError::Storage(_)));
}
