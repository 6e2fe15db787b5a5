//! Operator-facing log lines and the bounded ring that holds them.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Number of log entries retained per run.
pub const LOG_CAPACITY: usize = 50;

/// Severity of a log line as shown to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
  Info,
  Success,
  Error,
}

/// One operator-facing log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
  pub message: String,
  pub severity: Severity,
}

impl LogEntry {
  pub fn info(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      severity: Severity::Info,
    }
  }

  pub fn success(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      severity: Severity::Success,
    }
  }

  pub fn error(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      severity: Severity::Error,
    }
  }
}

/// Append-only ring of the most recent log entries; the oldest is evicted past capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawBoundedLog")]
pub struct BoundedLog {
  capacity: usize,
  entries: VecDeque<LogEntry>,
}

/// Wire form of [BoundedLog]; capacity and length are re-checked on the way in.
#[derive(Deserialize)]
struct RawBoundedLog {
  capacity: usize,
  entries: VecDeque<LogEntry>,
}

impl From<RawBoundedLog> for BoundedLog {
  fn from(raw: RawBoundedLog) -> Self {
    let mut log = BoundedLog::with_capacity(raw.capacity);
    for entry in raw.entries {
      log.push(entry);
    }
    log
  }
}

impl Default for BoundedLog {
  fn default() -> Self {
    Self::with_capacity(LOG_CAPACITY)
  }
}

impl BoundedLog {
  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      capacity: capacity.max(1),
      entries: VecDeque::with_capacity(capacity.max(1)),
    }
  }

  pub fn push(&mut self, entry: LogEntry) {
    if self.entries.len() == self.capacity {
      self.entries.pop_front();
    }
    self.entries.push_back(entry);
  }

  pub fn clear(&mut self) {
    self.entries.clear();
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Oldest first.
  pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
    self.entries.iter()
  }

  /// Newest first, the order a scrolling log view shows them.
  pub fn newest_first(&self) -> impl Iterator<Item = &LogEntry> {
    self.entries.iter().rev()
  }

  pub fn to_vec(&self) -> Vec<LogEntry> {
    self.entries.iter().cloned().collect()
  }
}
