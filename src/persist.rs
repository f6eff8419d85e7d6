//! On-disk persistence: a hash-enveloped JSON snapshot for the store document
//! and a JSONL append-only file for the history log.
//!
//! The snapshot is rewritten whole on every commit (last write wins, per the
//! service's durability contract); the history file only ever grows.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::history::EnergyHistoryRecord;

/// Current snapshot envelope version.
pub const SNAPSHOT_VERSION: u16 = 1;

/// Errors from the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    /// The snapshot payload does not match its recorded content hash.
    #[error("snapshot hash mismatch")]
    HashMismatch,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEnvelope<T> {
    version: u16,
    created_at: DateTime<Utc>,
    hash: String,
    document: T,
}

fn content_hash<T: Serialize>(document: &T) -> Result<String, PersistError> {
    let serialized = serde_json::to_vec(document)?;
    let mut hasher = Sha256::new();
    hasher.update(serialized);
    Ok(hex::encode(hasher.finalize()))
}

/// Writes a snapshot of `document` to `path`, creating parent directories as
/// needed.
pub fn save_snapshot<T: Serialize>(document: &T, path: &Path) -> Result<(), PersistError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let envelope = SnapshotEnvelope {
        version: SNAPSHOT_VERSION,
        created_at: Utc::now(),
        hash: content_hash(document)?,
        document,
    };

    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&serde_json::to_vec_pretty(&envelope)?)?;
    writer.flush()?;
    Ok(())
}

/// Loads a snapshot and verifies its content hash.
pub fn load_snapshot<T: Serialize + DeserializeOwned>(path: &Path) -> Result<T, PersistError> {
    let bytes = fs::read(path)?;
    let envelope: SnapshotEnvelope<T> = serde_json::from_slice(&bytes)?;

    if content_hash(&envelope.document)? != envelope.hash {
        return Err(PersistError::HashMismatch);
    }
    Ok(envelope.document)
}

/// Append-only writer for the history JSONL file, one record per line.
#[derive(Debug)]
pub struct HistoryLogWriter {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl HistoryLogWriter {
    /// Opens (or creates) the history file for appending.
    pub fn open(path: &Path) -> Result<Self, PersistError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    /// Appends one record and flushes it to the file.
    pub fn append(&mut self, record: &EnergyHistoryRecord) -> Result<(), PersistError> {
        let line = serde_json::to_string(record)?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Replays the history file in append order. A missing file yields an empty
/// log.
pub fn replay_history(path: &Path) -> Result<Vec<EnergyHistoryRecord>, PersistError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Weather;
    use tempfile::tempdir;

    fn record(timestamp_ms: i64) -> EnergyHistoryRecord {
        EnergyHistoryRecord {
            timestamp_ms,
            total_consumption_kw: 900.0,
            solar_output_kw: 300.0,
            wind_output_kw: 150.0,
            battery_level_kw: 2500.0,
            net_grid_load_kw: 450.0,
            weather_condition: Weather::Cloudy,
        }
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        counter: u32,
        label: String,
    }

    #[test]
    fn snapshot_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        let doc = Doc {
            counter: 9,
            label: "grid".to_string(),
        };

        save_snapshot(&doc, &path).unwrap();
        let loaded: Doc = load_snapshot(&path).unwrap();
        assert_eq!(loaded, doc);
    }

    #[test]
    fn snapshot_rejects_tampering() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        save_snapshot(
            &Doc {
                counter: 1,
                label: "a".to_string(),
            },
            &path,
        )
        .unwrap();

        let mut envelope: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        envelope["document"]["counter"] = serde_json::json!(999);
        fs::write(&path, serde_json::to_vec(&envelope).unwrap()).unwrap();

        let err = load_snapshot::<Doc>(&path).unwrap_err();
        assert!(matches!(err, PersistError::HashMismatch));
    }

    #[test]
    fn history_append_and_replay_preserve_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.jsonl");

        let mut writer = HistoryLogWriter::open(&path).unwrap();
        writer.append(&record(3)).unwrap();
        writer.append(&record(1)).unwrap();
        writer.append(&record(2)).unwrap();
        drop(writer);

        let replayed = replay_history(&path).unwrap();
        let stamps: Vec<i64> = replayed.iter().map(|r| r.timestamp_ms).collect();
        assert_eq!(stamps, vec![3, 1, 2]);
    }

    #[test]
    fn history_reopen_keeps_appending() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.jsonl");

        HistoryLogWriter::open(&path)
            .unwrap()
            .append(&record(1))
            .unwrap();
        HistoryLogWriter::open(&path)
            .unwrap()
            .append(&record(2))
            .unwrap();

        assert_eq!(replay_history(&path).unwrap().len(), 2);
    }

    #[test]
    fn replay_of_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let replayed = replay_history(&dir.path().join("nope.jsonl")).unwrap();
        assert!(replayed.is_empty());
    }
}
