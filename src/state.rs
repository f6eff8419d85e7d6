//! The simulated city state: one logical record that every other component
//! reads and writes.
//!
//! Updates arrive as a [`StateUpdate`] carrying only the changed fields. The
//! merge is all-or-nothing: the fully merged candidate is validated against
//! every field domain before it replaces the stored value, so a rejected
//! update leaves the state untouched.

use serde::{Deserialize, Serialize};

/// Minutes in one simulated day; `time` wraps modulo this.
pub const MINUTES_PER_DAY: u16 = 1440;

/// Installed battery capacity (kW). Upper domain bound for `bessCurrent`.
pub const BATTERY_CAPACITY_KW: f64 = 5000.0;

/// Sky condition driving solar output and dashboard iconography.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weather {
    Sunny,
    Cloudy,
    Rainy,
    Stormy,
}

impl Weather {
    /// Wire name of this condition.
    pub fn as_str(&self) -> &'static str {
        match self {
            Weather::Sunny => "sunny",
            Weather::Cloudy => "cloudy",
            Weather::Rainy => "rainy",
            Weather::Stormy => "stormy",
        }
    }

    /// Dashboard icon for this condition.
    pub fn icon(&self) -> &'static str {
        match self {
            Weather::Sunny => "☀️",
            Weather::Cloudy => "☁️",
            Weather::Rainy => "🌧️",
            Weather::Stormy => "⛈️",
        }
    }

    /// Fraction of nominal solar output available under this sky.
    pub fn solar_factor(&self) -> f64 {
        match self {
            Weather::Sunny => 1.0,
            Weather::Cloudy => 0.45,
            Weather::Rainy => 0.20,
            Weather::Stormy => 0.05,
        }
    }
}

/// Battery energy storage system operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BatteryMode {
    Auto,
    Manual,
    Standby,
}

/// Hospital UPS charge/discharge state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UpsState {
    Standby,
    Charging,
    Discharging,
}

/// Hospital backup power subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HospitalBackup {
    /// Whether utility grid power is reaching the hospital.
    pub grid_active: bool,
    /// Whether the diesel generator is running.
    pub gen_active: bool,
    /// UPS charge level in percent (0–100).
    pub ups_level: f64,
    /// UPS charge/discharge state.
    pub ups_state: UpsState,
}

impl HospitalBackup {
    /// Human-readable status classification.
    ///
    /// The grid check takes precedence over the UPS state: a hospital with
    /// `grid_active == false` reads "Grid Offline" even while discharging.
    pub fn status_label(&self) -> &'static str {
        if !self.grid_active {
            "Grid Offline"
        } else if self.ups_state == UpsState::Discharging {
            "On Battery Power"
        } else if self.ups_state == UpsState::Charging {
            "Charging UPS"
        } else {
            "Normal Operation"
        }
    }
}

/// The singleton simulated city state.
///
/// Field names on the wire match the dashboard contract (`time`, `windFlux`,
/// `bessMode`, ...). Exactly one logical instance exists; see
/// [`crate::store::Store`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemState {
    /// Minutes since midnight, `[0, 1440)`.
    #[serde(rename = "time")]
    pub time_minutes: u16,
    /// Current sky condition.
    pub weather: Weather,
    /// Normalized wind strength, clamped to `[0.0, 1.0]`.
    #[serde(rename = "windFlux")]
    pub wind_flux: f64,
    /// BESS operating mode.
    #[serde(rename = "bessMode")]
    pub battery_mode: BatteryMode,
    /// BESS stored level in kW, `[0, BATTERY_CAPACITY_KW]`.
    #[serde(rename = "bessCurrent")]
    pub battery_level_kw: f64,
    /// Hospital backup subsystem.
    pub hospital: HospitalBackup,
    /// Gates the tick driver: when false, ticks are no-ops.
    #[serde(rename = "isPlaying")]
    pub is_playing: bool,
    /// Playback speed multiplier (stored, not consumed by the tick law).
    pub speed: f64,
}

impl Default for SystemState {
    /// Provisioning defaults: noon, sunny, half wind, half battery, hospital
    /// on grid with a full UPS.
    fn default() -> Self {
        Self {
            time_minutes: 720,
            weather: Weather::Sunny,
            wind_flux: 0.5,
            battery_mode: BatteryMode::Auto,
            battery_level_kw: 2500.0,
            hospital: HospitalBackup {
                grid_active: true,
                gen_active: false,
                ups_level: 100.0,
                ups_state: UpsState::Standby,
            },
            is_playing: true,
            speed: 1.0,
        }
    }
}

impl SystemState {
    /// Formats `time_minutes` as `HH:MM`.
    ///
    /// # Examples
    ///
    /// ```
    /// use city_bms::state::SystemState;
    ///
    /// let state = SystemState::default();
    /// assert_eq!(state.clock_label(), "12:00");
    /// ```
    pub fn clock_label(&self) -> String {
        format!(
            "{:02}:{:02}",
            self.time_minutes / 60,
            self.time_minutes % 60
        )
    }

    /// Battery level as a percentage of installed capacity.
    pub fn battery_percent(&self) -> f64 {
        self.battery_level_kw / BATTERY_CAPACITY_KW * 100.0
    }

    /// Applies a partial update and validates the merged candidate.
    ///
    /// Fields absent from the update retain their prior values. On a
    /// validation failure nothing is committed and the error names the
    /// offending field.
    pub fn merged(&self, update: &StateUpdate) -> Result<SystemState, InvalidField> {
        let mut next = self.clone();

        if let Some(time) = update.time_minutes {
            next.time_minutes = time;
        }
        if let Some(weather) = update.weather {
            next.weather = weather;
        }
        if let Some(flux) = update.wind_flux {
            next.wind_flux = flux;
        }
        if let Some(mode) = update.battery_mode {
            next.battery_mode = mode;
        }
        if let Some(level) = update.battery_level_kw {
            next.battery_level_kw = level;
        }
        if let Some(ref hospital) = update.hospital {
            if let Some(grid) = hospital.grid_active {
                next.hospital.grid_active = grid;
            }
            if let Some(r#gen) = hospital.gen_active {
                next.hospital.gen_active = r#gen;
            }
            if let Some(level) = hospital.ups_level {
                next.hospital.ups_level = level;
            }
            if let Some(state) = hospital.ups_state {
                next.hospital.ups_state = state;
            }
        }
        if let Some(playing) = update.is_playing {
            next.is_playing = playing;
        }
        if let Some(speed) = update.speed {
            next.speed = speed;
        }

        next.validate()?;
        Ok(next)
    }

    fn validate(&self) -> Result<(), InvalidField> {
        if self.time_minutes >= MINUTES_PER_DAY {
            return Err(InvalidField::new(
                "time",
                format!("must be below {MINUTES_PER_DAY}, got {}", self.time_minutes),
            ));
        }
        if !self.wind_flux.is_finite() || !(0.0..=1.0).contains(&self.wind_flux) {
            return Err(InvalidField::new(
                "windFlux",
                format!("must lie in [0.0, 1.0], got {}", self.wind_flux),
            ));
        }
        if !self.battery_level_kw.is_finite()
            || !(0.0..=BATTERY_CAPACITY_KW).contains(&self.battery_level_kw)
        {
            return Err(InvalidField::new(
                "bessCurrent",
                format!(
                    "must lie in [0, {BATTERY_CAPACITY_KW}], got {}",
                    self.battery_level_kw
                ),
            ));
        }
        if !self.hospital.ups_level.is_finite()
            || !(0.0..=100.0).contains(&self.hospital.ups_level)
        {
            return Err(InvalidField::new(
                "hospital.upsLevel",
                format!("must lie in [0, 100], got {}", self.hospital.ups_level),
            ));
        }
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Err(InvalidField::new(
                "speed",
                format!("must be a positive number, got {}", self.speed),
            ));
        }
        Ok(())
    }
}

/// Strongly-typed partial update for [`SystemState`].
///
/// Every field is optional; only supplied fields are merged. Unknown keys are
/// rejected at deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateUpdate {
    #[serde(rename = "time")]
    pub time_minutes: Option<u16>,
    pub weather: Option<Weather>,
    #[serde(rename = "windFlux")]
    pub wind_flux: Option<f64>,
    #[serde(rename = "bessMode")]
    pub battery_mode: Option<BatteryMode>,
    #[serde(rename = "bessCurrent")]
    pub battery_level_kw: Option<f64>,
    pub hospital: Option<HospitalUpdate>,
    #[serde(rename = "isPlaying")]
    pub is_playing: Option<bool>,
    pub speed: Option<f64>,
}

/// Partial update for the hospital composite.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HospitalUpdate {
    pub grid_active: Option<bool>,
    pub gen_active: Option<bool>,
    pub ups_level: Option<f64>,
    pub ups_state: Option<UpsState>,
}

/// A field whose submitted value falls outside its declared domain.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid field {field}: {message}")]
pub struct InvalidField {
    /// Wire name of the offending field.
    pub field: &'static str,
    /// Constraint description.
    pub message: String,
}

impl InvalidField {
    fn new(field: &'static str, message: String) -> Self {
        Self { field, message }
    }
}
