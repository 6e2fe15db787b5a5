//! Sequential per-record pipeline.
//!
//! Records are processed strictly in order, one at a time. A failing record is
//! folded into a `Fail` outcome and never stops the loop; cancellation is
//! observed between records.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::error::RowError;
use crate::fetch::AttachmentFetcher;
use crate::reporter::ProgressReporter;
use crate::strategies::{RowContext, TransformStrategy};
use crate::table::TableClient;
use crate::types::{LogEntry, OutcomeKind, RecordRef, RunConfig, Summary, TransformOutcome};

/// Optional upper bound applied to each remote call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallPolicy {
  pub timeout: Option<Duration>,
}

/// Result of a bounded call that did not produce a value.
#[derive(Debug)]
pub enum Timed<E> {
  Elapsed,
  Failed(E),
}

impl<E: Into<RowError>> From<Timed<E>> for RowError {
  fn from(t: Timed<E>) -> Self {
    match t {
      Timed::Elapsed => RowError::Timeout,
      Timed::Failed(e) => e.into(),
    }
  }
}

impl CallPolicy {
  pub fn new(timeout: Option<Duration>) -> Self {
    Self { timeout }
  }

  /// Awaits `fut`, giving up with [Timed::Elapsed] once the timeout passes.
  pub async fn bounded<T, E, F>(&self, fut: F) -> Result<T, Timed<E>>
  where
    F: Future<Output = Result<T, E>>,
  {
    match self.timeout {
      Some(limit) => match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(Timed::Failed),
        Err(_) => Err(Timed::Elapsed),
      },
      None => fut.await.map_err(Timed::Failed),
    }
  }
}

/// Collaborators shared by every record of a run.
pub struct Pipeline<'a> {
  pub table: &'a dyn TableClient,
  pub fetcher: &'a dyn AttachmentFetcher,
  pub config: &'a RunConfig,
  pub policy: CallPolicy,
}

impl<'a> Pipeline<'a> {
  pub fn new(
    table: &'a dyn TableClient,
    fetcher: &'a dyn AttachmentFetcher,
    config: &'a RunConfig,
  ) -> Self {
    Self {
      table,
      fetcher,
      config,
      policy: CallPolicy::new(config.call_timeout),
    }
  }

  /// Processes `records` in order and finishes the reporter.
  ///
  /// The reporter's total must already be set to `records.len()`.
  #[instrument(level = "trace", skip_all, fields(strategy = strategy.name(), records = records.len()))]
  pub async fn run(
    &self,
    records: &[RecordRef],
    strategy: &dyn TransformStrategy,
    reporter: &mut ProgressReporter,
    cancel: &CancellationToken,
  ) -> Summary {
    let mut cancelled = false;
    for record in records {
      if cancel.is_cancelled() {
        cancelled = true;
        break;
      }
      let ordinal = reporter.advance();
      reporter.set_status(format!("processing {} of {}", ordinal, records.len()));
      let ctx = RowContext {
        table: self.table,
        fetcher: self.fetcher,
        table_id: &self.config.table_id,
        source_field_id: &self.config.source_field_id,
        record,
        ordinal,
        policy: &self.policy,
      };
      let (excerpt, outcome) = self.process_record(&ctx, strategy, reporter).await;
      let kind = outcome.kind();
      let entry = row_entry(ordinal, &excerpt, &outcome);
      if kind == OutcomeKind::Fail {
        warn!(record = %record, ordinal, message = %entry.message, "record failed");
      }
      reporter.record(kind, entry);
    }

    let processed = reporter.state().processed();
    let summary = reporter.state().summary(cancelled);
    let status = if cancelled {
      format!(
        "cancelled after {} of {} records: {}",
        processed,
        records.len(),
        summary
      )
    } else {
      format!("completed: {}", summary)
    };
    info!(%summary, cancelled, "pipeline finished");
    reporter.finish(status, cancelled)
  }

  /// Reads, transforms and writes one record. Never returns an error.
  async fn process_record(
    &self,
    ctx: &RowContext<'_>,
    strategy: &dyn TransformStrategy,
    reporter: &mut ProgressReporter,
  ) -> (String, TransformOutcome) {
    let value = match self
      .policy
      .bounded(self.table.get_field_value(
        ctx.table_id,
        ctx.source_field_id,
        ctx.record,
      ))
      .await
    {
      Ok(v) => v,
      Err(e) => return (String::new(), fail_with(RowError::from(e))),
    };
    if value.is_empty() {
      return (String::new(), TransformOutcome::skip("no input"));
    }
    let excerpt = value.excerpt();

    let transformed = AssertUnwindSafe(strategy.transform(ctx, value, reporter))
      .catch_unwind()
      .await;
    let outcome = match transformed {
      Ok(Ok(outcome)) => outcome,
      Ok(Err(e)) => fail_with(e),
      Err(panic) => fail_with(RowError::Panicked(panic_message(panic.as_ref()))),
    };

    let write = match outcome {
      TransformOutcome::Success(write) => write,
      other => return (excerpt, other),
    };
    let written = self
      .policy
      .bounded(self.table.set_field_value(
        ctx.table_id,
        &self.config.target_field_id,
        ctx.record,
        write.clone(),
      ))
      .await;
    let outcome = match written {
      Ok(true) => TransformOutcome::Success(write),
      Ok(false) => fail_with(RowError::WriteRejected),
      Err(e) => fail_with(RowError::from(e)),
    };
    (excerpt, outcome)
  }
}

fn fail_with(err: RowError) -> TransformOutcome {
  TransformOutcome::Fail(err.to_string())
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
  if let Some(s) = panic.downcast_ref::<&str>() {
    (*s).to_string()
  } else if let Some(s) = panic.downcast_ref::<String>() {
    s.clone()
  } else {
    "unknown panic".to_string()
  }
}

/// Log line for a finished record, tagged with its ordinal.
pub fn row_entry(ordinal: usize, excerpt: &str, outcome: &TransformOutcome) -> LogEntry {
  let subject = if excerpt.is_empty() {
    format!("row {}", ordinal)
  } else {
    format!("row {}: \"{}\"", ordinal, excerpt)
  };
  match outcome {
    TransformOutcome::Success(write) => {
      LogEntry::success(format!("{} -> {}", subject, write.describe()))
    }
    TransformOutcome::Skip(reason) => LogEntry::info(format!("{} skipped: {}", subject, reason)),
    TransformOutcome::Fail(reason) => LogEntry::error(format!("{} failed: {}", subject, reason)),
  }
}
