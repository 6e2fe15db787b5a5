//! End-to-end runs over `MemoryTable`: name resolution, image cropping, and the
//! conditions that stop a run before any record is written.

use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, GenericImageView, ImageFormat, Rgba, RgbaImage};
use rowforge::table::FieldKind;
use rowforge::types::{Attachment, DuplicatePolicy, RecordRef, Severity};
use rowforge::{
  AspectRatio, BatchRunner, FieldValue, MappingConfig, MemoryTable, PreconditionError, RunConfig,
  RunOptions, StrategyConfig, TableClient, TableSnapshot,
};
use tokio_util::sync::CancellationToken;

fn mapping_table(snapshot: TableSnapshot, rows: &[(&str, &str)]) -> TableSnapshot {
  let mut snapshot = snapshot.with_table(
    "people",
    "People",
    &[("name", FieldKind::Text), ("user", FieldKind::User)],
  );
  for (i, (name, user)) in rows.iter().enumerate() {
    snapshot = snapshot.with_record(
      "people",
      &format!("p{}", i + 1),
      vec![
        ("name", FieldValue::text(*name)),
        ("user", FieldValue::users(&[*user])),
      ],
    );
  }
  snapshot
}

fn tasks(names: &[&str]) -> TableSnapshot {
  let mut snapshot = TableSnapshot::default().with_table(
    "tasks",
    "Tasks",
    &[("who", FieldKind::Text), ("owner", FieldKind::User)],
  );
  for (i, name) in names.iter().enumerate() {
    snapshot = snapshot.with_record(
      "tasks",
      &format!("t{}", i + 1),
      vec![("who", FieldValue::text(*name))],
    );
  }
  snapshot
}

fn names_config() -> RunConfig {
  RunConfig::new(
    "tasks",
    "who",
    "owner",
    StrategyConfig::NameResolution {
      mapping: MappingConfig::new("people", "name", "user"),
    },
  )
}

fn runner_for(table: &Arc<MemoryTable>) -> BatchRunner {
  BatchRunner::new(table.clone(), table.clone())
}

async fn owner(table: &MemoryTable, record: &str) -> FieldValue {
  table
    .get_field_value("tasks", "owner", &RecordRef::new(record))
    .await
    .unwrap()
}

#[tokio::test]
async fn names_resolve_skip_blank_rows() {
  let snapshot = mapping_table(tasks(&["Alice", "", "Bob"]), &[("alice", "u1"), ("bob", "u2")]);
  let table = Arc::new(MemoryTable::new(snapshot));
  let result = runner_for(&table)
    .run(&names_config(), RunOptions::default())
    .await;

  let summary = result.outcome.unwrap();
  assert_eq!(
    (summary.success_count, summary.skip_count, summary.fail_count),
    (2, 1, 0)
  );
  assert_eq!(owner(&table, "t1").await, FieldValue::users(&["u1"]));
  assert_eq!(owner(&table, "t2").await, FieldValue::Empty);
  assert_eq!(owner(&table, "t3").await, FieldValue::users(&["u2"]));
}

#[tokio::test]
async fn unmapped_name_fails_its_row() {
  let snapshot = mapping_table(tasks(&["Carol"]), &[("alice", "u1")]);
  let table = Arc::new(MemoryTable::new(snapshot));
  let runner = runner_for(&table);
  let result = runner.run(&names_config(), RunOptions::default()).await;

  let summary = result.outcome.unwrap();
  assert_eq!(summary.fail_count, 1);
  assert!(!summary.is_clean());
  assert_eq!(owner(&table, "t1").await, FieldValue::Empty);
  let last = result.report.log.last().unwrap();
  assert_eq!(last.severity, Severity::Error);
  assert_eq!(last.message, "row 1: \"Carol\" failed: unmapped name");
}

#[tokio::test]
async fn empty_mapping_table_stops_before_any_row() {
  let snapshot = mapping_table(tasks(&["Alice", "Bob"]), &[]);
  let table = Arc::new(MemoryTable::new(snapshot));
  let runner = runner_for(&table);
  let result = runner.run(&names_config(), RunOptions::default()).await;

  assert!(matches!(result.outcome, Err(PreconditionError::EmptyMapping)));
  assert_eq!(table.write_count().await, 0);
  assert_eq!(runner.progress().current().current_index, 0);
}

#[tokio::test]
async fn rejecting_duplicates_is_a_precondition() {
  let snapshot = mapping_table(tasks(&["Alice"]), &[("Alice", "u1"), ("alice ", "u2")]);
  let table = Arc::new(MemoryTable::new(snapshot));
  let mut config = names_config();
  if let StrategyConfig::NameResolution { mapping } = &mut config.strategy {
    mapping.duplicate_policy = DuplicatePolicy::Reject;
  }
  let result = runner_for(&table).run(&config, RunOptions::default()).await;
  assert!(matches!(result.outcome, Err(PreconditionError::DuplicateKey(k)) if k == "alice"));
  assert_eq!(table.write_count().await, 0);
}

#[tokio::test]
async fn cancelled_before_start_writes_nothing() {
  let snapshot = mapping_table(tasks(&["Alice", "Bob"]), &[("alice", "u1"), ("bob", "u2")]);
  let table = Arc::new(MemoryTable::new(snapshot));
  let cancel = CancellationToken::new();
  cancel.cancel();
  let result = runner_for(&table)
    .run(
      &names_config(),
      RunOptions {
        cancel,
        ..RunOptions::default()
      },
    )
    .await;
  let summary = result.outcome.unwrap();
  assert!(summary.cancelled);
  assert_eq!(summary.processed(), 0);
  assert_eq!(table.write_count().await, 0);
  assert!(result.report.status.starts_with("cancelled after 0 of 2"));
}

fn png(width: u32, height: u32) -> Vec<u8> {
  let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([0, 0, 255, 255])));
  let mut out = Cursor::new(Vec::new());
  img.write_to(&mut out, ImageFormat::Png).unwrap();
  out.into_inner()
}

#[tokio::test]
async fn wide_image_is_cropped_to_square() {
  let snapshot = TableSnapshot::default()
    .with_table(
      "photos",
      "Photos",
      &[("src", FieldKind::Attachment), ("dst", FieldKind::Attachment)],
    )
    .with_record(
      "photos",
      "r1",
      vec![(
        "src",
        FieldValue::Attachments(vec![Attachment {
          token: "wide".to_string(),
          name: "Banner.PNG".to_string(),
          mime_type: Some("image/png".to_string()),
          url: None,
        }]),
      )],
    )
    .with_record("photos", "r2", vec![]);
  let table = Arc::new(MemoryTable::new(snapshot).with_blob("wide", png(400, 200)));
  let config = RunConfig::new(
    "photos",
    "src",
    "dst",
    StrategyConfig::ImageRatio {
      ratio: AspectRatio::new(1.0, 1.0),
    },
  );
  let result = runner_for(&table).run(&config, RunOptions::default()).await;
  let summary = result.outcome.unwrap();
  assert_eq!((summary.success_count, summary.skip_count), (1, 1));

  let dst = table
    .get_field_value("photos", "dst", &RecordRef::new("r1"))
    .await
    .unwrap();
  let written = &dst.attachments()[0];
  assert_eq!(written.name, "Banner_1x1.jpg");
  assert_eq!(written.mime_type.as_deref(), Some("image/jpeg"));
  let bytes = table.blob(&written.token).await.unwrap();
  let decoded = image::load_from_memory(&bytes).unwrap();
  assert_eq!(decoded.dimensions(), (200, 200));
}
