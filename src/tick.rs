//! The tick driver: advances simulated time and wind at a fixed wall-clock
//! cadence while the simulation is playing.
//!
//! At most one tick is ever in flight: the driver awaits each update before
//! sleeping again, and a missed interval firing is dropped rather than
//! queued. A failed or timed-out tick is logged and skipped; the next firing
//! starts from whatever state was last committed.

use std::time::Duration;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::history::EnergyHistoryRecord;
use crate::inventory::{city_demand_kw, solar_output_kw, wind_output_kw};
use crate::state::{MINUTES_PER_DAY, StateUpdate, SystemState};
use crate::store::{SharedStore, StoreError};

/// Maximum per-tick wind flux excursion, in either direction.
pub const WIND_JITTER: f64 = 0.05;

/// One tick advances simulated time by one minute, wrapping at midnight.
///
/// # Examples
///
/// ```
/// use city_bms::tick::advance_minutes;
///
/// assert_eq!(advance_minutes(720), 721);
/// assert_eq!(advance_minutes(1439), 0);
/// ```
pub fn advance_minutes(minutes: u16) -> u16 {
    (minutes + 1) % MINUTES_PER_DAY
}

/// Drifts the wind flux by a uniform delta in `[-WIND_JITTER, +WIND_JITTER]`,
/// clamped to `[0.0, 1.0]`.
pub fn jitter_wind(flux: f64, rng: &mut impl Rng) -> f64 {
    let delta = rng.random_range(-WIND_JITTER..=WIND_JITTER);
    (flux + delta).clamp(0.0, 1.0)
}

/// Builds the merge-update for one tick: exactly the two changed fields.
pub fn tick_update(state: &SystemState, rng: &mut impl Rng) -> StateUpdate {
    StateUpdate {
        time_minutes: Some(advance_minutes(state.time_minutes)),
        wind_flux: Some(jitter_wind(state.wind_flux, rng)),
        ..StateUpdate::default()
    }
}

/// Computes the periodic energy-mix snapshot from the current state and
/// inventory.
pub fn energy_snapshot(
    state: &SystemState,
    buildings: &[crate::inventory::Building],
    systems: &[crate::inventory::EnergySystem],
    timestamp_ms: i64,
) -> EnergyHistoryRecord {
    let consumption = city_demand_kw(buildings, state.time_minutes);
    let solar = solar_output_kw(systems, state.time_minutes, state.weather);
    let wind = wind_output_kw(systems, state.wind_flux);

    EnergyHistoryRecord {
        timestamp_ms,
        total_consumption_kw: consumption,
        solar_output_kw: solar,
        wind_output_kw: wind,
        battery_level_kw: state.battery_level_kw,
        net_grid_load_kw: consumption - solar - wind,
        weather_condition: state.weather,
    }
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// State advanced and a snapshot was recorded.
    Advanced,
    /// `isPlaying` was false (or the state is unprovisioned): nothing was
    /// written.
    Paused,
}

/// Executes one tick against the shared store.
///
/// Holds the store lock across the read, the merge-update, and the history
/// append, so the snapshot always describes the state the tick produced.
pub async fn tick_once(store: &SharedStore, rng: &mut StdRng) -> Result<TickOutcome, StoreError> {
    let mut store = store.lock().await;

    let Some(state) = store.system_state() else {
        return Ok(TickOutcome::Paused);
    };
    if !state.is_playing {
        return Ok(TickOutcome::Paused);
    }

    let update = tick_update(state, rng);
    let next = store.update_state(&update)?;

    let buildings: Vec<_> = store.buildings().into_iter().cloned().collect();
    let systems: Vec<_> = store.energy_systems().into_iter().cloned().collect();
    let record = energy_snapshot(&next, &buildings, &systems, Utc::now().timestamp_millis());
    store.record_history(record)?;

    Ok(TickOutcome::Advanced)
}

/// Periodic driver owning the tick cadence and its RNG.
pub struct TickDriver {
    store: SharedStore,
    period: Duration,
    update_timeout: Duration,
    rng: StdRng,
}

impl TickDriver {
    /// Creates a driver with the given cadence, per-tick timeout, and seed.
    pub fn new(store: SharedStore, period: Duration, update_timeout: Duration, seed: u64) -> Self {
        Self {
            store,
            period,
            update_timeout,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Runs until `shutdown` flips to true or its sender is dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first interval firing is immediate; consume it so the first
        // advance happens a full period after startup, like the dashboard
        // timer did.
        ticker.tick().await;

        info!(period = ?self.period, "tick driver started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let tick = tick_once(&self.store, &mut self.rng);
                    match tokio::time::timeout(self.update_timeout, tick).await {
                        Ok(Ok(TickOutcome::Advanced)) => debug!("tick applied"),
                        Ok(Ok(TickOutcome::Paused)) => debug!("simulation paused, tick skipped"),
                        Ok(Err(err)) => warn!(error = %err, "tick update failed, dropped"),
                        Err(_) => warn!(timeout = ?self.update_timeout, "tick timed out, dropped"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("tick driver stopping");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Weather;
    use crate::store::Store;

    fn seeded_rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    fn shared_store(playing: bool) -> SharedStore {
        let mut store = Store::in_memory();
        store.ensure_provisioned("a", "g").unwrap();
        let update = StateUpdate {
            is_playing: Some(playing),
            ..StateUpdate::default()
        };
        store.update_state(&update).unwrap();
        store.into_shared()
    }

    #[test]
    fn advance_wraps_at_midnight() {
        assert_eq!(advance_minutes(0), 1);
        assert_eq!(advance_minutes(1438), 1439);
        assert_eq!(advance_minutes(1439), 0);
    }

    #[test]
    fn advancing_a_full_day_returns_to_start() {
        let mut t = 517;
        for _ in 0..MINUTES_PER_DAY {
            t = advance_minutes(t);
        }
        assert_eq!(t, 517);
    }

    #[test]
    fn jitter_stays_in_unit_interval_at_both_bounds() {
        let mut rng = seeded_rng();
        for _ in 0..1000 {
            let low = jitter_wind(0.0, &mut rng);
            assert!((0.0..=1.0).contains(&low));
            assert!(low <= WIND_JITTER + 1e-12);

            let high = jitter_wind(1.0, &mut rng);
            assert!((0.0..=1.0).contains(&high));
            assert!(high >= 1.0 - WIND_JITTER - 1e-12);
        }
    }

    #[test]
    fn jitter_moves_at_most_the_configured_step() {
        let mut rng = seeded_rng();
        for _ in 0..1000 {
            let next = jitter_wind(0.5, &mut rng);
            assert!((next - 0.5).abs() <= WIND_JITTER + 1e-12);
        }
    }

    #[test]
    fn tick_update_carries_exactly_two_fields() {
        let state = SystemState::default();
        let update = tick_update(&state, &mut seeded_rng());
        assert!(update.time_minutes.is_some());
        assert!(update.wind_flux.is_some());
        assert!(update.weather.is_none());
        assert!(update.battery_mode.is_none());
        assert!(update.battery_level_kw.is_none());
        assert!(update.hospital.is_none());
        assert!(update.is_playing.is_none());
        assert!(update.speed.is_none());
    }

    #[test]
    fn midnight_wrap_scenario() {
        // state {time: 1439, windFlux: 0.95} -> one tick ->
        // {time: 0, windFlux in [0.90, 1.00]}
        let mut state = SystemState::default();
        state.time_minutes = 1439;
        state.wind_flux = 0.95;

        let update = tick_update(&state, &mut seeded_rng());
        assert_eq!(update.time_minutes, Some(0));
        let flux = update.wind_flux.unwrap();
        assert!((0.90..=1.00).contains(&flux));
    }

    #[test]
    fn snapshot_balances_the_grid() {
        let state = SystemState::default();
        let buildings = crate::inventory::default_buildings();
        let systems = crate::inventory::default_energy_systems();

        let record = energy_snapshot(&state, &buildings, &systems, 1_000);
        assert_eq!(record.timestamp_ms, 1_000);
        assert_eq!(record.weather_condition, Weather::Sunny);
        assert_eq!(record.battery_level_kw, state.battery_level_kw);
        let expected_net =
            record.total_consumption_kw - record.solar_output_kw - record.wind_output_kw;
        assert!((record.net_grid_load_kw - expected_net).abs() < 1e-9);
        // Noon under a clear sky: the solar array is producing.
        assert!(record.solar_output_kw > 0.0);
    }

    #[test]
    fn snapshot_has_no_solar_at_night() {
        let mut state = SystemState::default();
        state.time_minutes = 120; // 02:00
        let systems = crate::inventory::default_energy_systems();
        let record = energy_snapshot(&state, &[], &systems, 0);
        assert_eq!(record.solar_output_kw, 0.0);
    }

    #[tokio::test]
    async fn paused_tick_is_a_no_op() {
        let store = shared_store(false);
        let before = store.lock().await.system_state().unwrap().clone();

        let outcome = tick_once(&store, &mut seeded_rng()).await.unwrap();
        assert_eq!(outcome, TickOutcome::Paused);

        let guard = store.lock().await;
        assert_eq!(guard.system_state().unwrap(), &before);
        assert!(guard.history().is_empty());
    }

    #[tokio::test]
    async fn playing_tick_advances_and_records() {
        let store = shared_store(true);
        let before = store.lock().await.system_state().unwrap().clone();

        let outcome = tick_once(&store, &mut seeded_rng()).await.unwrap();
        assert_eq!(outcome, TickOutcome::Advanced);

        let guard = store.lock().await;
        let after = guard.system_state().unwrap();
        assert_eq!(after.time_minutes, advance_minutes(before.time_minutes));
        assert!((after.wind_flux - before.wind_flux).abs() <= WIND_JITTER + 1e-12);
        // Untouched fields survive the merge.
        assert_eq!(after.weather, before.weather);
        assert_eq!(after.battery_level_kw, before.battery_level_kw);
        assert_eq!(guard.history().len(), 1);
    }

    #[tokio::test]
    async fn unprovisioned_store_skips_the_tick() {
        let store = Store::in_memory().into_shared();
        let outcome = tick_once(&store, &mut seeded_rng()).await.unwrap();
        assert_eq!(outcome, TickOutcome::Paused);
    }
}
