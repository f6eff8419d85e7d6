//! City inventory: metered buildings and grid-connected energy systems,
//! plus the demand/output curves the periodic snapshot is computed from.

use serde::{Deserialize, Serialize};

use crate::state::Weather;

/// Sunrise, minutes since midnight. Solar output is zero before this.
const SUNRISE_MINUTE: f64 = 360.0;
/// Sunset, minutes since midnight. Solar output is zero from here on.
const SUNSET_MINUTE: f64 = 1080.0;

/// Daily load-curve family for a building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurveType {
    /// Evening-peaked household profile.
    Residential,
    /// Midday-peaked office/retail profile.
    Commercial,
    /// Near-constant draw (hospitals, data rooms).
    Flat,
}

impl CurveType {
    /// Position of the daily peak as a fraction of the day.
    fn peak_pos(&self) -> f64 {
        match self {
            CurveType::Residential => 19.0 / 24.0,
            CurveType::Commercial => 13.0 / 24.0,
            CurveType::Flat => 0.0,
        }
    }
}

/// A metered building on the city grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub building_id: String,
    pub name: String,
    /// Category label for the dashboard ("municipal", "medical", ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Overnight minimum draw (kW).
    pub base_load_kw: f64,
    /// Peak draw at the top of the daily curve (kW).
    pub peak_load_kw: f64,
    pub curve_type: CurveType,
    /// Intra-day ripple amplitude as a fraction of instantaneous load.
    pub variance: f64,
    /// Demand throttle, `[0.0, 1.0]`; scales the variable part of the curve.
    pub throttle: f64,
    pub is_active: bool,
}

impl Building {
    /// Instantaneous demand at the given simulated minute (kW).
    ///
    /// Base plus a cosine daily curve scaled by `throttle`, with a small
    /// deterministic ripple proportional to `variance`. Inactive buildings
    /// draw nothing.
    pub fn demand_kw(&self, minutes: u16) -> f64 {
        if !self.is_active {
            return 0.0;
        }
        let day_pos = f64::from(minutes) / 1440.0;
        let shape = match self.curve_type {
            CurveType::Flat => 0.5,
            curve => {
                let angle = std::f64::consts::TAU * (day_pos - curve.peak_pos());
                0.5 * (1.0 + angle.cos())
            }
        };
        let ripple = 1.0 + self.variance * (std::f64::consts::TAU * day_pos * 6.0).sin();
        let kw = (self.base_load_kw + (self.peak_load_kw - self.base_load_kw) * shape * self.throttle)
            * ripple;
        kw.max(0.0)
    }
}

/// Energy system category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemKind {
    Solar,
    Wind,
    Battery,
    Backup,
}

/// Operational status of an energy system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemStatus {
    Online,
    Offline,
    Maintenance,
}

/// A grid-connected generation or storage asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergySystem {
    pub system_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SystemKind,
    pub capacity_kw: f64,
    pub current_output_kw: f64,
    /// Conversion efficiency, `[0.0, 1.0]`.
    pub efficiency: f64,
    pub status: SystemStatus,
}

impl EnergySystem {
    fn online_capacity(&self, kind: SystemKind) -> f64 {
        if self.kind == kind && self.status == SystemStatus::Online {
            self.capacity_kw
        } else {
            0.0
        }
    }
}

/// Half-sine daylight fraction for a simulated minute: zero outside the
/// sunrise/sunset window, 1.0 at solar noon.
pub fn daylight_frac(minutes: u16) -> f64 {
    let m = f64::from(minutes);
    if m < SUNRISE_MINUTE || m >= SUNSET_MINUTE {
        return 0.0;
    }
    let frac = (m - SUNRISE_MINUTE) / (SUNSET_MINUTE - SUNRISE_MINUTE);
    (std::f64::consts::PI * frac).sin()
}

/// Aggregate solar output across online solar systems (kW).
pub fn solar_output_kw(systems: &[EnergySystem], minutes: u16, weather: Weather) -> f64 {
    let capacity: f64 = systems
        .iter()
        .map(|s| s.online_capacity(SystemKind::Solar))
        .sum();
    capacity * daylight_frac(minutes) * weather.solar_factor()
}

/// Aggregate wind output across online wind systems (kW).
pub fn wind_output_kw(systems: &[EnergySystem], wind_flux: f64) -> f64 {
    let capacity: f64 = systems
        .iter()
        .map(|s| s.online_capacity(SystemKind::Wind))
        .sum();
    capacity * wind_flux
}

/// Citywide demand across active buildings (kW).
pub fn city_demand_kw(buildings: &[Building], minutes: u16) -> f64 {
    buildings.iter().map(|b| b.demand_kw(minutes)).sum()
}

/// Buildings provisioned on first startup.
pub fn default_buildings() -> Vec<Building> {
    vec![
        Building {
            building_id: "bld-city-hall".to_string(),
            name: "City Hall".to_string(),
            kind: "municipal".to_string(),
            base_load_kw: 120.0,
            peak_load_kw: 340.0,
            curve_type: CurveType::Commercial,
            variance: 0.08,
            throttle: 1.0,
            is_active: true,
        },
        Building {
            building_id: "bld-general-hospital".to_string(),
            name: "General Hospital".to_string(),
            kind: "medical".to_string(),
            base_load_kw: 450.0,
            peak_load_kw: 520.0,
            curve_type: CurveType::Flat,
            variance: 0.03,
            throttle: 1.0,
            is_active: true,
        },
        Building {
            building_id: "bld-riverside-apartments".to_string(),
            name: "Riverside Apartments".to_string(),
            kind: "residential".to_string(),
            base_load_kw: 180.0,
            peak_load_kw: 430.0,
            curve_type: CurveType::Residential,
            variance: 0.1,
            throttle: 1.0,
            is_active: true,
        },
        Building {
            building_id: "bld-northside-school".to_string(),
            name: "Northside School".to_string(),
            kind: "education".to_string(),
            base_load_kw: 60.0,
            peak_load_kw: 210.0,
            curve_type: CurveType::Commercial,
            variance: 0.12,
            throttle: 1.0,
            is_active: true,
        },
    ]
}

/// Energy systems provisioned on first startup.
pub fn default_energy_systems() -> Vec<EnergySystem> {
    vec![
        EnergySystem {
            system_id: "sys-southfield-solar".to_string(),
            name: "Southfield Solar Array".to_string(),
            kind: SystemKind::Solar,
            capacity_kw: 3000.0,
            current_output_kw: 0.0,
            efficiency: 0.86,
            status: SystemStatus::Online,
        },
        EnergySystem {
            system_id: "sys-ridgeline-wind".to_string(),
            name: "Ridgeline Wind Park".to_string(),
            kind: SystemKind::Wind,
            capacity_kw: 2000.0,
            current_output_kw: 0.0,
            efficiency: 0.92,
            status: SystemStatus::Online,
        },
        EnergySystem {
            system_id: "sys-central-bess".to_string(),
            name: "Central Battery Bank".to_string(),
            kind: SystemKind::Battery,
            capacity_kw: 5000.0,
            current_output_kw: 0.0,
            efficiency: 0.94,
            status: SystemStatus::Online,
        },
        EnergySystem {
            system_id: "sys-hospital-diesel".to_string(),
            name: "Hospital Diesel Backup".to_string(),
            kind: SystemKind::Backup,
            capacity_kw: 800.0,
            current_output_kw: 0.0,
            efficiency: 0.38,
            status: SystemStatus::Offline,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn building(curve: CurveType, variance: f64) -> Building {
        Building {
            building_id: "bld-test".to_string(),
            name: "Test".to_string(),
            kind: "test".to_string(),
            base_load_kw: 100.0,
            peak_load_kw: 300.0,
            curve_type: curve,
            variance,
            throttle: 1.0,
            is_active: true,
        }
    }

    #[test]
    fn inactive_building_draws_nothing() {
        let mut b = building(CurveType::Residential, 0.0);
        b.is_active = false;
        assert_eq!(b.demand_kw(720), 0.0);
    }

    #[test]
    fn residential_curve_peaks_in_the_evening() {
        let b = building(CurveType::Residential, 0.0);
        let evening = b.demand_kw(19 * 60);
        let morning = b.demand_kw(7 * 60);
        assert!(evening > morning);
        assert!((evening - 300.0).abs() < 1.0);
    }

    #[test]
    fn flat_curve_is_constant_without_ripple() {
        let b = building(CurveType::Flat, 0.0);
        assert_eq!(b.demand_kw(0), b.demand_kw(720));
        assert_eq!(b.demand_kw(0), 200.0); // base + half the span
    }

    #[test]
    fn throttle_scales_only_the_variable_part() {
        let mut b = building(CurveType::Residential, 0.0);
        b.throttle = 0.0;
        assert!((b.demand_kw(19 * 60) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn daylight_is_dark_at_night_and_full_at_noon() {
        assert_eq!(daylight_frac(0), 0.0);
        assert_eq!(daylight_frac(359), 0.0);
        assert_eq!(daylight_frac(1080), 0.0);
        assert!((daylight_frac(720) - 1.0).abs() < 1e-9);
        assert!(daylight_frac(400) > 0.0);
    }

    #[test]
    fn solar_output_respects_weather_and_status() {
        let mut systems = default_energy_systems();
        let sunny = solar_output_kw(&systems, 720, Weather::Sunny);
        let stormy = solar_output_kw(&systems, 720, Weather::Stormy);
        assert!((sunny - 3000.0).abs() < 1e-6);
        assert!(stormy < sunny * 0.1);

        // Knocking the array offline removes all solar.
        for s in &mut systems {
            if s.kind == SystemKind::Solar {
                s.status = SystemStatus::Maintenance;
            }
        }
        assert_eq!(solar_output_kw(&systems, 720, Weather::Sunny), 0.0);
    }

    #[test]
    fn wind_output_is_proportional_to_flux() {
        let systems = default_energy_systems();
        assert_eq!(wind_output_kw(&systems, 0.0), 0.0);
        assert!((wind_output_kw(&systems, 0.5) - 1000.0).abs() < 1e-6);
        assert!((wind_output_kw(&systems, 1.0) - 2000.0).abs() < 1e-6);
    }

    #[test]
    fn provisioned_ids_are_unique() {
        let buildings = default_buildings();
        let mut ids: Vec<&str> = buildings.iter().map(|b| b.building_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), buildings.len());

        let systems = default_energy_systems();
        let mut ids: Vec<&str> = systems.iter().map(|s| s.system_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), systems.len());
    }
}
