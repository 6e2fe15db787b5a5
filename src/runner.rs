//! Batch runner: validates a [RunConfig], builds the strategy and drives the pipeline.
//!
//! - [BatchRunner::run]: run the strategy named by the config.
//! - [BatchRunner::run_with_strategy]: run a caller-supplied strategy over the same pipeline.
//!
//! Only one run per runner is active at a time; a second call while one is in
//! flight fails with [PreconditionError::AlreadyRunning].

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{SecondsFormat, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{Span, error, info, instrument};

use crate::error::PreconditionError;
use crate::fetch::AttachmentFetcher;
use crate::index_builder::load_identity_index;
use crate::pipeline::{CallPolicy, Pipeline, Timed};
use crate::reporter::{ProgressChannel, ProgressReporter};
use crate::run_log_io::{self, RUN_LOG_FILENAME};
use crate::strategies::{ImageRatioStrategy, NameResolutionStrategy, TransformStrategy};
use crate::table::TableClient;
use crate::types::{
  LogEntry, RUN_REPORT_VERSION, RecordRef, RunConfig, RunReport, StrategyConfig, Summary,
};

/// Options for [BatchRunner::run].
#[derive(Default)]
pub struct RunOptions<'a> {
  /// If set, the run report is written here on exit (to `run_dir/run.log.json`).
  pub run_dir: Option<&'a Path>,
  /// Cancelling stops the run before the next record.
  pub cancel: CancellationToken,
}

/// What a run produced: its summary (or the precondition that stopped it) and the report.
#[derive(Debug)]
pub struct RunResult {
  pub outcome: Result<Summary, PreconditionError>,
  pub report: RunReport,
}

/// Owns the collaborators and the progress channel shared by successive runs.
pub struct BatchRunner {
  table: Arc<dyn TableClient>,
  fetcher: Arc<dyn AttachmentFetcher>,
  progress: ProgressChannel,
  running: AtomicBool,
}

/// Releases the single-run flag on every exit path.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
  fn drop(&mut self) {
    self.0.store(false, Ordering::Release);
  }
}

impl BatchRunner {
  pub fn new(table: Arc<dyn TableClient>, fetcher: Arc<dyn AttachmentFetcher>) -> Self {
    Self {
      table,
      fetcher,
      progress: ProgressChannel::new(),
      running: AtomicBool::new(false),
    }
  }

  pub fn progress(&self) -> &ProgressChannel {
    &self.progress
  }

  pub fn is_running(&self) -> bool {
    self.running.load(Ordering::Acquire)
  }

  /// Runs the strategy described by `config.strategy`.
  pub async fn run(&self, config: &RunConfig, options: RunOptions<'_>) -> RunResult {
    self.run_inner(config, None, options).await
  }

  /// Runs `strategy` instead of the one named by the config. The config is still
  /// validated as a whole, and no mapping index is built.
  pub async fn run_with_strategy(
    &self,
    config: &RunConfig,
    strategy: &dyn TransformStrategy,
    options: RunOptions<'_>,
  ) -> RunResult {
    self.run_inner(config, Some(strategy), options).await
  }

  #[instrument(level = "info", skip_all, fields(run_id = tracing::field::Empty, table = %config.table_id))]
  async fn run_inner(
    &self,
    config: &RunConfig,
    custom: Option<&dyn TransformStrategy>,
    options: RunOptions<'_>,
  ) -> RunResult {
    let run_id = uuid::Uuid::new_v4().to_string();
    Span::current().record("run_id", run_id.as_str());
    let started_at = now_rfc3339();
    let strategy_name = custom.map_or(config.strategy.name(), |s| s.name());

    let _guard = match self.acquire() {
      Some(guard) => guard,
      None => {
        let err = PreconditionError::AlreadyRunning;
        let report = RunReport {
          version: RUN_REPORT_VERSION,
          run_id,
          strategy: strategy_name.to_string(),
          table_id: config.table_id.clone(),
          started_at,
          finished_at: None,
          status: format!("failed: {}", err),
          summary: None,
          log: Vec::new(),
        };
        return RunResult {
          outcome: Err(err),
          report,
        };
      }
    };

    let mut reporter = self.progress.reporter();
    reporter.begin("initializing");
    info!(strategy = strategy_name, "run started");

    let outcome = self
      .execute(config, custom, &mut reporter, &options.cancel)
      .await;
    let (status, summary) = match &outcome {
      Ok(summary) => (reporter.state().status_message.clone(), Some(*summary)),
      Err(e) => {
        error!(error = %e, "run aborted before processing records");
        let status = format!("failed: {}", e);
        reporter.append_log(LogEntry::error(e.to_string()));
        reporter.finish(status.clone(), false);
        (status, None)
      }
    };

    let report = RunReport {
      version: RUN_REPORT_VERSION,
      run_id,
      strategy: strategy_name.to_string(),
      table_id: config.table_id.clone(),
      started_at,
      finished_at: summary.map(|_| now_rfc3339()),
      status,
      summary,
      log: reporter.state().log.to_vec(),
    };
    if let Some(run_dir) = options.run_dir {
      let path = run_dir.join(RUN_LOG_FILENAME);
      if let Err(e) = run_log_io::save_run_report(&path, &report) {
        error!(error = %e, path = %path.display(), "failed to write run report");
      }
    }
    RunResult { outcome, report }
  }

  fn acquire(&self) -> Option<RunGuard<'_>> {
    self
      .running
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .ok()
      .map(|_| RunGuard(&self.running))
  }

  async fn execute(
    &self,
    config: &RunConfig,
    custom: Option<&dyn TransformStrategy>,
    reporter: &mut ProgressReporter,
    cancel: &CancellationToken,
  ) -> Result<Summary, PreconditionError> {
    config.validate()?;
    let pipeline = Pipeline::new(self.table.as_ref(), self.fetcher.as_ref(), config);
    let records = self.list_records(config, &pipeline.policy).await?;

    let built: Box<dyn TransformStrategy>;
    let strategy: &dyn TransformStrategy = match custom {
      Some(s) => s,
      None => {
        built = self.build_strategy(config, &pipeline.policy, reporter).await?;
        built.as_ref()
      }
    };

    reporter.set_total(records.len());
    reporter.set_status("processing");
    reporter.append_log(LogEntry::info(format!(
      "processing {} record(s) with {}",
      records.len(),
      strategy.name()
    )));
    Ok(pipeline.run(&records, strategy, reporter, cancel).await)
  }

  async fn list_records(
    &self,
    config: &RunConfig,
    policy: &CallPolicy,
  ) -> Result<Vec<RecordRef>, PreconditionError> {
    let records = policy
      .bounded(self.table.list_record_ids(&config.table_id))
      .await
      .map_err(|t| match t {
        Timed::Elapsed => PreconditionError::Timeout,
        Timed::Failed(e) => PreconditionError::Table(e),
      })?;
    if records.is_empty() {
      return Err(PreconditionError::NoRecords(config.table_id.clone()));
    }
    Ok(records)
  }

  async fn build_strategy(
    &self,
    config: &RunConfig,
    policy: &CallPolicy,
    reporter: &mut ProgressReporter,
  ) -> Result<Box<dyn TransformStrategy>, PreconditionError> {
    match &config.strategy {
      StrategyConfig::ImageRatio { ratio } => Ok(Box::new(ImageRatioStrategy::new(*ratio))),
      StrategyConfig::NameResolution { mapping } => {
        reporter.set_status("building name mapping");
        reporter.append_log(LogEntry::info(format!(
          "building name mapping from table {}",
          mapping.table_id
        )));
        let index = load_identity_index(self.table.as_ref(), mapping, policy).await?;
        reporter.append_log(LogEntry::success(format!(
          "mapping built: {} name(s), {} row(s) skipped",
          index.len(),
          index.excluded_rows()
        )));
        if !index.duplicate_keys().is_empty() {
          reporter.append_log(LogEntry::info(format!(
            "duplicate names in mapping ({:?}): {}",
            mapping.duplicate_policy,
            index.duplicate_keys().join(", ")
          )));
        }
        Ok(Box::new(NameResolutionStrategy::new(Arc::new(index))))
      }
    }
  }
}

fn now_rfc3339() -> String {
  Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
