//! The owned, single-writer store behind the API and the tick driver.
//!
//! Exactly one [`Store`] exists per service. All writers go through one
//! [`SharedStore`] handle, so every mutation is a whole-value commit under
//! the lock; there is no partial write for readers to observe. Mutations
//! are persisted as a snapshot document; history records additionally go to
//! the append-only JSONL file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::auth::{PasswordHash, Role, User};
use crate::history::{EnergyHistoryRecord, HistoryLog};
use crate::inventory::{
    Building, EnergySystem, SystemStatus, default_buildings, default_energy_systems,
};
use crate::persist::{self, HistoryLogWriter, PersistError};
use crate::state::{InvalidField, StateUpdate, SystemState};

/// Snapshot file name inside the data directory.
const SNAPSHOT_FILE: &str = "snapshot.json";
/// History log file name inside the data directory.
const HISTORY_FILE: &str = "history.jsonl";

/// Store failure taxonomy: validation, not-found, storage.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] InvalidField),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0} already exists")]
    Conflict(&'static str),
    #[error(transparent)]
    Storage(#[from] PersistError),
}

/// Handle shared between the router and the tick driver.
pub type SharedStore = Arc<Mutex<Store>>;

/// Everything the snapshot persists. History lives in its own JSONL file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    state: Option<SystemState>,
    users: Vec<User>,
    next_user_id: u64,
    buildings: Vec<Building>,
    energy_systems: Vec<EnergySystem>,
}

#[derive(Debug)]
struct Disk {
    snapshot_path: PathBuf,
    history: HistoryLogWriter,
}

/// Fields replaced by `PUT /api/users/{id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub role: Role,
    pub name: String,
    pub assigned_unit_id: Option<String>,
    pub is_active: bool,
}

/// Fields replaced by `PUT /api/system/buildings/{id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BuildingUpdate {
    pub base_load_kw: f64,
    pub peak_load_kw: f64,
    pub variance: f64,
    pub throttle: f64,
    pub is_active: bool,
}

/// Fields replaced by `PUT /api/energy/systems/{id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EnergySystemUpdate {
    pub current_output_kw: f64,
    pub efficiency: f64,
    pub status: SystemStatus,
}

/// Parameters for creating an account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: Option<String>,
    pub password: String,
    pub role: Role,
    pub name: String,
    pub assigned_unit_id: Option<String>,
}

/// The single-writer city store.
#[derive(Debug)]
pub struct Store {
    state: Option<SystemState>,
    users: BTreeMap<u64, User>,
    next_user_id: u64,
    buildings: BTreeMap<String, Building>,
    energy_systems: BTreeMap<String, EnergySystem>,
    history: HistoryLog,
    disk: Option<Disk>,
}

impl Store {
    /// An empty, non-persistent store. Used by tests and by `--export-history`.
    pub fn in_memory() -> Self {
        Self {
            state: None,
            users: BTreeMap::new(),
            next_user_id: 1,
            buildings: BTreeMap::new(),
            energy_systems: BTreeMap::new(),
            history: HistoryLog::new(),
            disk: None,
        }
    }

    /// Opens the store rooted at `data_dir`, loading the snapshot (verified
    /// against its content hash) and replaying the history log when present.
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        let snapshot_path = data_dir.join(SNAPSHOT_FILE);
        let history_path = data_dir.join(HISTORY_FILE);

        let document: StoreDocument = if snapshot_path.exists() {
            persist::load_snapshot(&snapshot_path)?
        } else {
            StoreDocument::default()
        };

        let history = HistoryLog::from_records(persist::replay_history(&history_path)?);
        let writer = HistoryLogWriter::open(&history_path)?;

        Ok(Self {
            state: document.state,
            users: document.users.into_iter().map(|u| (u.id, u)).collect(),
            next_user_id: document.next_user_id.max(1),
            buildings: document
                .buildings
                .into_iter()
                .map(|b| (b.building_id.clone(), b))
                .collect(),
            energy_systems: document
                .energy_systems
                .into_iter()
                .map(|s| (s.system_id.clone(), s))
                .collect(),
            history,
            disk: Some(Disk {
                snapshot_path,
                history: writer,
            }),
        })
    }

    /// Wraps the store in the shared handle.
    pub fn into_shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    /// Provisions defaults when the store is empty: the singleton state, the
    /// city inventory, and the bootstrap accounts. Returns whether anything
    /// was provisioned.
    pub fn ensure_provisioned(
        &mut self,
        admin_password: &str,
        guest_password: &str,
    ) -> Result<bool, StoreError> {
        if self.state.is_some() {
            return Ok(false);
        }

        self.state = Some(SystemState::default());
        for building in default_buildings() {
            self.buildings.insert(building.building_id.clone(), building);
        }
        for system in default_energy_systems() {
            self.energy_systems.insert(system.system_id.clone(), system);
        }
        self.insert_user(NewUser {
            username: "admin".to_string(),
            email: Some("admin@city.invalid".to_string()),
            password: admin_password.to_string(),
            role: Role::Admin,
            name: "Grid Administrator".to_string(),
            assigned_unit_id: None,
        })?;
        self.insert_user(NewUser {
            username: "guest".to_string(),
            email: None,
            password: guest_password.to_string(),
            role: Role::Guest,
            name: "Guest Monitor".to_string(),
            assigned_unit_id: None,
        })?;

        self.commit()?;
        Ok(true)
    }

    // --- system state ---

    /// The singleton state, when provisioned.
    pub fn system_state(&self) -> Option<&SystemState> {
        self.state.as_ref()
    }

    /// Applies a validated partial update to the singleton state and commits
    /// the snapshot. Returns the post-merge state.
    pub fn update_state(&mut self, update: &StateUpdate) -> Result<SystemState, StoreError> {
        let current = self.state.as_ref().ok_or(StoreError::NotFound("system state"))?;
        let next = current.merged(update)?;
        self.state = Some(next.clone());
        self.commit()?;
        Ok(next)
    }

    // --- history ---

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    /// Appends a history record: file first, then memory, so a storage
    /// failure leaves the in-memory log untouched.
    pub fn record_history(&mut self, record: EnergyHistoryRecord) -> Result<(), StoreError> {
        if let Some(disk) = self.disk.as_mut() {
            disk.history.append(&record)?;
        }
        self.history.append(record);
        Ok(())
    }

    // --- users ---

    /// All accounts, newest first (registration order).
    pub fn users(&self) -> Vec<&User> {
        let mut users: Vec<&User> = self.users.values().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        users
    }

    pub fn user(&self, id: u64) -> Option<&User> {
        self.users.get(&id)
    }

    pub fn user_by_username(&self, username: &str) -> Option<&User> {
        self.users.values().find(|u| u.username == username)
    }

    /// Creates an account and commits. Fails on duplicate username.
    pub fn add_user(&mut self, new_user: NewUser) -> Result<u64, StoreError> {
        let id = self.insert_user(new_user)?;
        self.commit()?;
        Ok(id)
    }

    fn insert_user(&mut self, new_user: NewUser) -> Result<u64, StoreError> {
        if self.user_by_username(&new_user.username).is_some() {
            return Err(StoreError::Conflict("username"));
        }
        let id = self.next_user_id;
        self.next_user_id += 1;
        self.users.insert(
            id,
            User {
                id,
                username: new_user.username,
                email: new_user.email,
                password: PasswordHash::new(&new_user.password),
                role: new_user.role,
                name: new_user.name,
                assigned_unit_id: new_user.assigned_unit_id,
                is_active: true,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    /// Replaces the editable profile fields and commits.
    pub fn update_user(&mut self, id: u64, update: UserUpdate) -> Result<(), StoreError> {
        let user = self.users.get_mut(&id).ok_or(StoreError::NotFound("user"))?;
        user.email = update.email;
        user.role = update.role;
        user.name = update.name;
        user.assigned_unit_id = update.assigned_unit_id;
        user.is_active = update.is_active;
        self.commit()
    }

    pub fn delete_user(&mut self, id: u64) -> Result<(), StoreError> {
        if self.users.remove(&id).is_none() {
            return Err(StoreError::NotFound("user"));
        }
        self.commit()
    }

    /// Rotates a password hash and commits.
    pub fn set_user_password(&mut self, id: u64, password: &str) -> Result<(), StoreError> {
        let user = self.users.get_mut(&id).ok_or(StoreError::NotFound("user"))?;
        user.password = PasswordHash::new(password);
        self.commit()
    }

    // --- inventory ---

    /// All buildings, ordered by name.
    pub fn buildings(&self) -> Vec<&Building> {
        let mut buildings: Vec<&Building> = self.buildings.values().collect();
        buildings.sort_by(|a, b| a.name.cmp(&b.name));
        buildings
    }

    /// Replaces a building's tunable fields and commits.
    pub fn update_building(&mut self, id: &str, update: BuildingUpdate) -> Result<(), StoreError> {
        if update.base_load_kw < 0.0 || update.peak_load_kw < 0.0 {
            return Err(InvalidField {
                field: "baseLoadKw",
                message: "load values must be non-negative".to_string(),
            }
            .into());
        }
        if !(0.0..=1.0).contains(&update.variance) {
            return Err(InvalidField {
                field: "variance",
                message: format!("must lie in [0, 1], got {}", update.variance),
            }
            .into());
        }
        if !(0.0..=1.0).contains(&update.throttle) {
            return Err(InvalidField {
                field: "throttle",
                message: format!("must lie in [0, 1], got {}", update.throttle),
            }
            .into());
        }

        let building = self
            .buildings
            .get_mut(id)
            .ok_or(StoreError::NotFound("building"))?;
        building.base_load_kw = update.base_load_kw;
        building.peak_load_kw = update.peak_load_kw;
        building.variance = update.variance;
        building.throttle = update.throttle;
        building.is_active = update.is_active;
        self.commit()
    }

    /// All energy systems, ordered by kind then name.
    pub fn energy_systems(&self) -> Vec<&EnergySystem> {
        let mut systems: Vec<&EnergySystem> = self.energy_systems.values().collect();
        systems.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.name.cmp(&b.name)));
        systems
    }

    /// Replaces an energy system's operating point and commits.
    pub fn update_energy_system(
        &mut self,
        id: &str,
        update: EnergySystemUpdate,
    ) -> Result<(), StoreError> {
        let system = self
            .energy_systems
            .get_mut(id)
            .ok_or(StoreError::NotFound("energy system"))?;

        if !(0.0..=1.0).contains(&update.efficiency) {
            return Err(InvalidField {
                field: "efficiency",
                message: format!("must lie in [0, 1], got {}", update.efficiency),
            }
            .into());
        }
        if update.current_output_kw < 0.0 || update.current_output_kw > system.capacity_kw {
            return Err(InvalidField {
                field: "currentOutputKw",
                message: format!(
                    "must lie in [0, {}], got {}",
                    system.capacity_kw, update.current_output_kw
                ),
            }
            .into());
        }

        system.current_output_kw = update.current_output_kw;
        system.efficiency = update.efficiency;
        system.status = update.status;
        self.commit()
    }

    /// Active-entity counts for the settings endpoint.
    pub fn settings_counts(&self) -> (usize, usize, usize) {
        let buildings = self.buildings.values().filter(|b| b.is_active).count();
        let systems = self
            .energy_systems
            .values()
            .filter(|s| s.status == SystemStatus::Online)
            .count();
        let users = self.users.values().filter(|u| u.is_active).count();
        (buildings, systems, users)
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        let Some(disk) = self.disk.as_ref() else {
            return Ok(());
        };
        let document = StoreDocument {
            state: self.state.clone(),
            users: self.users.values().cloned().collect(),
            next_user_id: self.next_user_id,
            buildings: self.buildings.values().cloned().collect(),
            energy_systems: self.energy_systems.values().cloned().collect(),
        };
        persist::save_snapshot(&document, &disk.snapshot_path)?;
        Ok(())
    }
}
