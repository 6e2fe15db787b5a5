//! Tests for `runner`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{PreconditionError, RowError};
use crate::reporter::ProgressReporter;
use crate::run_log_io::{RUN_LOG_FILENAME, load_run_report};
use crate::runner::{BatchRunner, RunOptions};
use crate::strategies::{RowContext, TransformStrategy};
use crate::table::{FieldKind, MemoryTable, TableClient, TableSnapshot};
use crate::types::{FieldValue, MappingConfig, RecordRef, RunConfig, StrategyConfig, TransformOutcome};

fn base() -> TableSnapshot {
  TableSnapshot::default()
    .with_table(
      "tbl",
      "Tasks",
      &[("who", FieldKind::Text), ("owner", FieldKind::User)],
    )
    .with_record("tbl", "r1", vec![("who", FieldValue::text("Alice"))])
    .with_record("tbl", "r2", vec![("who", FieldValue::text("Dave"))])
    .with_table(
      "map",
      "People",
      &[("name", FieldKind::Text), ("user", FieldKind::User)],
    )
}

fn with_mapping(snapshot: TableSnapshot) -> TableSnapshot {
  snapshot
    .with_record(
      "map",
      "m1",
      vec![
        ("name", FieldValue::text("alice")),
        ("user", FieldValue::users(&["u1"])),
      ],
    )
    .with_record("map", "m2", vec![("name", FieldValue::text("nobody"))])
}

fn names_config() -> RunConfig {
  RunConfig::new(
    "tbl",
    "who",
    "owner",
    StrategyConfig::NameResolution {
      mapping: MappingConfig::new("map", "name", "user"),
    },
  )
}

fn runner(table: &Arc<MemoryTable>) -> BatchRunner {
  BatchRunner::new(table.clone(), table.clone())
}

#[tokio::test]
async fn name_run_writes_report_and_keeps_final_state() {
  let table = Arc::new(MemoryTable::new(with_mapping(base())));
  let runner = runner(&table);
  let dir = tempfile::tempdir().unwrap();
  let result = runner
    .run(
      &names_config(),
      RunOptions {
        run_dir: Some(dir.path()),
        ..RunOptions::default()
      },
    )
    .await;

  let summary = result.outcome.unwrap();
  assert_eq!(summary.success_count, 1);
  assert_eq!(summary.fail_count, 1);
  assert_eq!(table.write_count().await, 1);

  let state = runner.progress().current();
  assert!(!state.running);
  assert_eq!(state.current_index, 2);
  assert_eq!(state.total, 2);
  assert_eq!(state.status_message, "completed: success: 1, skip: 0, fail: 1");
  let lines: Vec<String> = state.log.iter().map(|e| e.message.clone()).collect();
  assert_eq!(lines[0], "building name mapping from table map");
  assert_eq!(lines[1], "mapping built: 1 name(s), 1 row(s) skipped");
  assert!(lines.contains(&"row 2: \"Dave\" failed: unmapped name".to_string()));

  let report = load_run_report(&dir.path().join(RUN_LOG_FILENAME)).unwrap();
  assert_eq!(report.strategy, "name_resolution");
  assert_eq!(report.run_id, result.report.run_id);
  assert!(report.finished_at.is_some());
  assert_eq!(report.summary, Some(summary));
  assert!(!runner.is_running());
}

#[tokio::test]
async fn empty_mapping_aborts_before_any_write() {
  let table = Arc::new(MemoryTable::new(base()));
  let runner = runner(&table);
  let result = runner.run(&names_config(), RunOptions::default()).await;
  assert!(matches!(result.outcome, Err(PreconditionError::EmptyMapping)));
  assert_eq!(table.write_count().await, 0);
  assert!(result.report.summary.is_none());
  assert!(result.report.finished_at.is_none());

  let state = runner.progress().current();
  assert!(!state.running);
  assert_eq!(state.current_index, 0);
  assert!(state.status_message.starts_with("failed: mapping table contains no usable"));
}

#[tokio::test]
async fn missing_selection_and_empty_table_are_preconditions() {
  let table = Arc::new(MemoryTable::new(with_mapping(base()).with_table(
    "empty",
    "Empty",
    &[("who", FieldKind::Text), ("owner", FieldKind::User)],
  )));
  let runner = runner(&table);

  let mut config = names_config();
  config.source_field_id.clear();
  let result = runner.run(&config, RunOptions::default()).await;
  assert!(matches!(
    result.outcome,
    Err(PreconditionError::MissingSelection("source field"))
  ));

  let mut config = names_config();
  config.table_id = "empty".to_string();
  let result = runner.run(&config, RunOptions::default()).await;
  assert!(matches!(result.outcome, Err(PreconditionError::NoRecords(t)) if t == "empty"));
  assert_eq!(table.write_count().await, 0);
}

/// Holds each record for a moment so a second run can collide with it.
struct SlowSkip;

#[async_trait]
impl TransformStrategy for SlowSkip {
  fn name(&self) -> &'static str {
    "slow_skip"
  }

  async fn transform(
    &self,
    _row: &RowContext<'_>,
    _value: FieldValue,
    _reporter: &mut ProgressReporter,
  ) -> Result<TransformOutcome, RowError> {
    tokio::time::sleep(Duration::from_millis(20)).await;
    Ok(TransformOutcome::skip("slow"))
  }
}

#[tokio::test]
async fn second_run_while_active_is_rejected() {
  let table = Arc::new(MemoryTable::new(with_mapping(base())));
  let runner = runner(&table);
  let config = names_config();
  let (first, second) = tokio::join!(
    runner.run_with_strategy(&config, &SlowSkip, RunOptions::default()),
    runner.run_with_strategy(&config, &SlowSkip, RunOptions::default()),
  );
  let (done, rejected) = if first.outcome.is_ok() {
    (first, second)
  } else {
    (second, first)
  };
  assert_eq!(done.outcome.unwrap().skip_count, 2);
  assert!(matches!(rejected.outcome, Err(PreconditionError::AlreadyRunning)));
  assert_eq!(rejected.report.strategy, "slow_skip");

  let again = runner
    .run_with_strategy(&config, &SlowSkip, RunOptions::default())
    .await;
  assert!(again.outcome.is_ok());
}

#[tokio::test]
async fn custom_strategy_does_not_touch_mapping() {
  // No mapping rows: the named strategy would fail, a custom one must not care.
  let table = Arc::new(MemoryTable::new(base()));
  let runner = runner(&table);
  let result = runner
    .run_with_strategy(&names_config(), &SlowSkip, RunOptions::default())
    .await;
  assert_eq!(result.outcome.unwrap().skip_count, 2);
  let who = table
    .get_field_value("tbl", "owner", &RecordRef::new("r1"))
    .await
    .unwrap();
  assert_eq!(who, FieldValue::Empty);
}
