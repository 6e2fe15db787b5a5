//! DTO for run.log.json: the persisted record of one finished run.

use serde::{Deserialize, Serialize};

use super::{LogEntry, Summary};

/// Current format version written to run.log.json.
pub const RUN_REPORT_VERSION: u32 = 1;

/// Root structure for run.log.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
  /// Log format version.
  pub version: u32,
  /// Run id (uuid v4), also recorded on the tracing span.
  pub run_id: String,
  /// Strategy name (e.g. "image_ratio", "name_resolution").
  pub strategy: String,
  /// Table the run transformed.
  pub table_id: String,
  /// RFC 3339 timestamp when the run started.
  pub started_at: String,
  /// RFC 3339 timestamp when the run finished (None if it never got past preconditions).
  pub finished_at: Option<String>,
  /// Final status line shown to the operator.
  pub status: String,
  /// Counts; absent when a precondition failed.
  pub summary: Option<Summary>,
  /// The bounded operator log, oldest first.
  pub log: Vec<LogEntry>,
}
