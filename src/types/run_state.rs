//! Mutable state of one run, as observed by progress watchers.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{BoundedLog, OutcomeKind};

/// Final (or partial, when cancelled) counts of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
  pub total: usize,
  pub success_count: usize,
  pub skip_count: usize,
  pub fail_count: usize,
  pub cancelled: bool,
}

impl Summary {
  pub fn processed(&self) -> usize {
    self.success_count + self.skip_count + self.fail_count
  }

  /// True when every record was processed and none failed.
  pub fn is_clean(&self) -> bool {
    !self.cancelled && self.fail_count == 0 && self.processed() == self.total
  }
}

impl fmt::Display for Summary {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "success: {}, skip: {}, fail: {}",
      self.success_count, self.skip_count, self.fail_count
    )
  }
}

/// State of one run: progress, counters, status line and the bounded log.
///
/// Owned and mutated only by the pipeline; everyone else sees snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
  pub current_index: usize,
  pub total: usize,
  pub success_count: usize,
  pub skip_count: usize,
  pub fail_count: usize,
  pub status_message: String,
  pub log: BoundedLog,
  pub running: bool,
}

impl RunState {
  pub fn record(&mut self, kind: OutcomeKind) {
    match kind {
      OutcomeKind::Success => self.success_count += 1,
      OutcomeKind::Skip => self.skip_count += 1,
      OutcomeKind::Fail => self.fail_count += 1,
    }
  }

  pub fn processed(&self) -> usize {
    self.success_count + self.skip_count + self.fail_count
  }

  pub fn summary(&self, cancelled: bool) -> Summary {
    Summary {
      total: self.total,
      success_count: self.success_count,
      skip_count: self.skip_count,
      fail_count: self.fail_count,
      cancelled,
    }
  }

  /// `current_index <= total` and no more outcomes than records.
  pub fn is_consistent(&self) -> bool {
    self.current_index <= self.total && self.processed() <= self.total
  }

  /// Progress as a fraction in `0.0..=1.0`; zero when nothing is queued.
  pub fn fraction(&self) -> f64 {
    if self.total == 0 {
      0.0
    } else {
      self.current_index as f64 / self.total as f64
    }
  }
}
