//! Tests for `ImageRatioStrategy`.

use std::io::Cursor;

use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage};

use crate::pipeline::CallPolicy;
use crate::reporter::{ProgressChannel, ProgressReporter};
use crate::strategies::{ImageRatioStrategy, RowContext, TransformStrategy, is_image_name};
use crate::table::{FieldKind, MemoryTable, TableSnapshot};
use crate::types::{AspectRatio, Attachment, FieldValue, FieldWrite, RecordRef, TransformOutcome};

fn png(width: u32, height: u32) -> Vec<u8> {
  let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([10, 200, 30])));
  let mut out = Cursor::new(Vec::new());
  img.write_to(&mut out, ImageFormat::Png).unwrap();
  out.into_inner()
}

fn attachment(token: &str, name: &str) -> Attachment {
  Attachment {
    token: token.to_string(),
    name: name.to_string(),
    mime_type: None,
    url: None,
  }
}

fn photos_table(value: &FieldValue) -> MemoryTable {
  let snapshot = TableSnapshot::default()
    .with_table(
      "tbl",
      "Photos",
      &[("src", FieldKind::Attachment), ("dst", FieldKind::Attachment)],
    )
    .with_record("tbl", "r1", vec![("src", value.clone())]);
  MemoryTable::new(snapshot)
    .with_blob("wide", png(400, 200))
    .with_blob("broken", b"not an image".to_vec())
}

async fn run(value: FieldValue) -> (TransformOutcome, ProgressReporter) {
  let table = &photos_table(&value);
  let channel = ProgressChannel::new();
  let mut reporter = channel.reporter();
  reporter.begin("test");
  let record = RecordRef::new("r1");
  let policy = CallPolicy::default();
  let ctx = RowContext {
    table,
    fetcher: table,
    table_id: "tbl",
    source_field_id: "src",
    record: &record,
    ordinal: 1,
    policy: &policy,
  };
  let outcome = ImageRatioStrategy::new(AspectRatio::new(1.0, 1.0))
    .transform(&ctx, value, &mut reporter)
    .await
    .unwrap();
  (outcome, reporter)
}

#[test]
fn image_extensions_match_case_insensitively() {
  assert!(is_image_name("a.JPG"));
  assert!(is_image_name("photo.jpeg"));
  assert!(is_image_name("x.WebP"));
  assert!(is_image_name("y.bmp"));
  assert!(!is_image_name("notes.txt"));
  assert!(!is_image_name("png"));
  assert!(!is_image_name("archive.png.zip"));
}

#[tokio::test]
async fn wide_image_becomes_square_jpeg() {
  let (outcome, reporter) = run(FieldValue::Attachments(vec![attachment("wide", "a.png")])).await;
  let files = match outcome {
    TransformOutcome::Success(FieldWrite::Files(files)) => files,
    other => panic!("unexpected outcome {:?}", other),
  };
  assert_eq!(files.len(), 1);
  assert_eq!(files[0].name, "a_1x1.jpg");
  assert_eq!(files[0].mime_type, "image/jpeg");
  let decoded = image::load_from_memory(&files[0].content).unwrap();
  assert_eq!(decoded.dimensions(), (200, 200));
  let lines: Vec<String> = reporter.state().log.iter().map(|e| e.message.clone()).collect();
  assert!(lines.iter().any(|l| l == "processed: a_1x1.jpg"));
}

#[tokio::test]
async fn non_images_are_skipped_and_images_kept() {
  let value = FieldValue::Attachments(vec![
    attachment("doc", "notes.txt"),
    attachment("wide", "b.PNG"),
  ]);
  let (outcome, reporter) = run(value).await;
  match outcome {
    TransformOutcome::Success(FieldWrite::Files(files)) => {
      assert_eq!(files.len(), 1);
      assert_eq!(files[0].name, "b_1x1.jpg");
    }
    other => panic!("unexpected outcome {:?}", other),
  }
  assert!(
    reporter
      .state()
      .log
      .iter()
      .any(|e| e.message == "skipping non-image file: notes.txt")
  );
}

#[tokio::test]
async fn only_non_images_is_skip() {
  let (outcome, _) = run(FieldValue::Attachments(vec![attachment("doc", "a.pdf")])).await;
  assert_eq!(outcome, TransformOutcome::skip("no image attachments"));
}

#[tokio::test]
async fn missing_name_defaults_to_jpg() {
  let (outcome, _) = run(FieldValue::Attachments(vec![attachment("wide", "")])).await;
  match outcome {
    TransformOutcome::Success(FieldWrite::Files(files)) => assert_eq!(files[0].name, "image_1x1.jpg"),
    other => panic!("unexpected outcome {:?}", other),
  }
}

#[tokio::test]
async fn all_failures_fail_the_row_with_last_error() {
  let value = FieldValue::Attachments(vec![
    attachment("gone", "a.png"),
    attachment("broken", "b.png"),
  ]);
  let (outcome, reporter) = run(value).await;
  match outcome {
    TransformOutcome::Fail(reason) => assert!(reason.starts_with("failed to decode image")),
    other => panic!("unexpected outcome {:?}", other),
  }
  let errors = reporter
    .state()
    .log
    .iter()
    .filter(|e| e.message.starts_with("attachment failed"))
    .count();
  assert_eq!(errors, 2);
}

#[tokio::test]
async fn partial_failure_still_succeeds() {
  let value = FieldValue::Attachments(vec![
    attachment("broken", "a.png"),
    attachment("wide", "b.png"),
  ]);
  let (outcome, _) = run(value).await;
  assert_eq!(outcome.kind().to_string(), "success");
}
