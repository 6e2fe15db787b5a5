//! Progress and log reporting for one run.
//!
//! The pipeline owns a [ProgressReporter] and is the only writer. Every mutation
//! publishes a fresh [RunState] snapshot on a `watch` channel; observers hold a
//! receiver (or a [WatchStream]) and never touch the live state.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::types::{LogEntry, OutcomeKind, RunState, Summary};

/// Publishing side of the run-state channel, shared by a runner across runs.
#[derive(Debug, Clone)]
pub struct ProgressChannel {
  tx: Arc<watch::Sender<RunState>>,
}

impl Default for ProgressChannel {
  fn default() -> Self {
    Self::new()
  }
}

impl ProgressChannel {
  pub fn new() -> Self {
    let (tx, _rx) = watch::channel(RunState::default());
    Self { tx: Arc::new(tx) }
  }

  pub fn subscribe(&self) -> watch::Receiver<RunState> {
    self.tx.subscribe()
  }

  /// Snapshots as a stream; yields the current state first.
  pub fn stream(&self) -> WatchStream<RunState> {
    WatchStream::new(self.subscribe())
  }

  /// Latest published snapshot.
  pub fn current(&self) -> RunState {
    self.tx.borrow().clone()
  }

  /// Starts a reporter for a new run. The previous run's state is replaced.
  pub fn reporter(&self) -> ProgressReporter {
    ProgressReporter {
      state: RunState::default(),
      tx: Arc::clone(&self.tx),
    }
  }
}

/// Single writer of a run's [RunState].
#[derive(Debug)]
pub struct ProgressReporter {
  state: RunState,
  tx: Arc<watch::Sender<RunState>>,
}

impl ProgressReporter {
  pub fn state(&self) -> &RunState {
    &self.state
  }

  /// Marks the run active, clears the log and sets the initial status.
  pub fn begin(&mut self, status: impl Into<String>) {
    self.state = RunState {
      running: true,
      status_message: status.into(),
      ..RunState::default()
    };
    self.publish();
  }

  pub fn set_total(&mut self, total: usize) {
    self.state.total = total;
    self.state.current_index = 0;
    self.publish();
  }

  /// Moves to the next record; returns its 1-based ordinal. Never passes `total`.
  pub fn advance(&mut self) -> usize {
    if self.state.current_index < self.state.total {
      self.state.current_index += 1;
    }
    self.publish();
    self.state.current_index
  }

  pub fn set_status(&mut self, text: impl Into<String>) {
    self.state.status_message = text.into();
    self.publish();
  }

  pub fn append_log(&mut self, entry: LogEntry) {
    self.state.log.push(entry);
    self.publish();
  }

  /// Counts one record outcome and logs its line in one published update.
  pub fn record(&mut self, kind: OutcomeKind, entry: LogEntry) {
    self.state.record(kind);
    self.state.log.push(entry);
    self.publish();
  }

  /// Ends the run: sets the final status and clears `running`. Progress, counters
  /// and log stay readable until the next run begins.
  pub fn finish(&mut self, status: impl Into<String>, cancelled: bool) -> Summary {
    let summary = self.state.summary(cancelled);
    self.state.status_message = status.into();
    self.state.running = false;
    self.publish();
    summary
  }

  fn publish(&self) {
    self.tx.send_replace(self.state.clone());
  }
}
