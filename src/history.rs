//! Append-only log of energy-metric snapshots and its query surface.
//!
//! Records are immutable once appended and ordered queries go by the
//! caller-supplied timestamp. Duplicate and out-of-order timestamps are
//! accepted; the log never mutates or deletes.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::state::Weather;

/// One immutable energy-mix snapshot.
///
/// Wire names match the dashboard's history table columns; `timestamp` is
/// epoch milliseconds, supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyHistoryRecord {
    /// Epoch milliseconds. No uniqueness or ordering constraint.
    #[serde(rename = "timestamp")]
    pub timestamp_ms: i64,
    /// Citywide consumption (kW).
    pub total_consumption_kw: f64,
    /// Solar generation (kW).
    pub solar_output_kw: f64,
    /// Wind generation (kW).
    pub wind_output_kw: f64,
    /// BESS stored level at snapshot time (kW).
    pub battery_level_kw: f64,
    /// Net load on the utility grid (kW): consumption minus renewables.
    pub net_grid_load_kw: f64,
    /// Sky condition at snapshot time.
    pub weather_condition: Weather,
}

impl EnergyHistoryRecord {
    /// Snapshot time as a UTC datetime, if the millisecond value is
    /// representable.
    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp_ms)
    }
}

/// Per-day aggregate over the history log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayEfficiency {
    /// UTC calendar day.
    pub date: NaiveDate,
    pub avg_solar: f64,
    pub avg_wind: f64,
    pub avg_consumption: f64,
    pub avg_net_load: f64,
    /// Number of records contributing to the averages.
    pub data_points: usize,
}

/// The in-memory history log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryLog {
    records: Vec<EnergyHistoryRecord>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a log from previously persisted records, preserving append
    /// order.
    pub fn from_records(records: Vec<EnergyHistoryRecord>) -> Self {
        Self { records }
    }

    /// Appends one record. Never fails: duplicates and out-of-order
    /// timestamps are accepted.
    pub fn append(&mut self, record: EnergyHistoryRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EnergyHistoryRecord> {
        self.records.iter()
    }

    /// The record with the greatest timestamp, regardless of append order.
    pub fn latest(&self) -> Option<&EnergyHistoryRecord> {
        self.records.iter().max_by_key(|r| r.timestamp_ms)
    }

    /// Up to `limit` records with `timestamp >= cutoff_ms`, in non-increasing
    /// timestamp order.
    pub fn recent(&self, limit: usize, cutoff_ms: i64) -> Vec<EnergyHistoryRecord> {
        let mut window: Vec<EnergyHistoryRecord> = self
            .records
            .iter()
            .filter(|r| r.timestamp_ms >= cutoff_ms)
            .cloned()
            .collect();
        window.sort_by_key(|r| std::cmp::Reverse(r.timestamp_ms));
        window.truncate(limit);
        window
    }

    /// Per-day averages over the trailing `days` days before `now`, newest
    /// day first. Records whose timestamp cannot be mapped to a UTC day are
    /// skipped.
    pub fn daily_efficiency(&self, days: i64, now: DateTime<Utc>) -> Vec<DayEfficiency> {
        let cutoff = now - Duration::days(days);

        #[derive(Default)]
        struct Acc {
            solar: f64,
            wind: f64,
            consumption: f64,
            net_load: f64,
            count: usize,
        }

        let mut buckets: BTreeMap<NaiveDate, Acc> = BTreeMap::new();
        for record in &self.records {
            let Some(at) = record.recorded_at() else {
                continue;
            };
            if at < cutoff || at > now {
                continue;
            }
            let acc = buckets.entry(at.date_naive()).or_default();
            acc.solar += record.solar_output_kw;
            acc.wind += record.wind_output_kw;
            acc.consumption += record.total_consumption_kw;
            acc.net_load += record.net_grid_load_kw;
            acc.count += 1;
        }

        buckets
            .into_iter()
            .rev()
            .map(|(date, acc)| {
                let n = acc.count as f64;
                DayEfficiency {
                    date,
                    avg_solar: acc.solar / n,
                    avg_wind: acc.wind / n,
                    avg_consumption: acc.consumption / n,
                    avg_net_load: acc.net_load / n,
                    data_points: acc.count,
                }
            })
            .collect()
    }
}
