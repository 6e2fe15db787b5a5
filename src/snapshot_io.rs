//! Table snapshot save/load (JSON) for the in-memory backend.

use std::path::Path;

use tracing::instrument;

use crate::table::TableSnapshot;

/// Default snapshot filename when none is given.
pub const SNAPSHOT_FILENAME: &str = "tables.json";

/// Saves a snapshot to `path` as pretty JSON. Creates parent directory if needed.
#[instrument(level = "trace", skip(path, snapshot))]
pub fn save_snapshot(path: &Path, snapshot: &TableSnapshot) -> Result<(), std::io::Error> {
  let json = serde_json::to_string_pretty(snapshot)
    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent)?;
  }
  std::fs::write(path, json)
}

/// Loads a snapshot from `path`. Returns error if file is missing or invalid JSON.
#[instrument(level = "trace", skip(path))]
pub fn load_snapshot(path: &Path) -> Result<TableSnapshot, std::io::Error> {
  let bytes = std::fs::read(path)?;
  serde_json::from_slice(&bytes)
    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}
