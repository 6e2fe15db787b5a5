//! run.log.json save/load: the persisted report of one run.

use std::path::Path;

use crate::types::RunReport;

/// Default filename for the run report under a run directory.
pub const RUN_LOG_FILENAME: &str = "run.log.json";

/// Default run directory when none is configured.
pub const DEFAULT_RUN_DIR: &str = ".rowforge";

/// Writes `report` to `path` as pretty JSON. Creates parent directory if needed.
pub fn save_run_report(path: &Path, report: &RunReport) -> Result<(), std::io::Error> {
  let json = serde_json::to_string_pretty(report)
    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent)?;
  }
  std::fs::write(path, json)
}

/// Loads a run report from `path`. Returns error if file is missing or invalid JSON.
pub fn load_run_report(path: &Path) -> Result<RunReport, std::io::Error> {
  let bytes = std::fs::read(path)?;
  serde_json::from_slice(&bytes)
    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}
