//! Center-crops every image attachment of a record to a fixed aspect ratio.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, instrument};

use super::{RowContext, TransformStrategy};
use crate::error::{RowError, TableError};
use crate::geometry::{OUTPUT_MIME, crop_to_ratio, output_file_name};
use crate::reporter::ProgressReporter;
use crate::types::{AspectRatio, Attachment, FieldValue, FieldWrite, LogEntry, TransformOutcome, UploadFile};

/// Name assumed for attachments that carry none.
pub const DEFAULT_IMAGE_NAME: &str = "image.jpg";

static IMAGE_NAME: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"(?i)\.(jpg|jpeg|png|webp|gif|bmp)$").expect("image extension pattern is valid")
});

/// Whether a file name has one of the recognised image extensions.
pub fn is_image_name(name: &str) -> bool {
  IMAGE_NAME.is_match(name)
}

#[derive(Debug, Clone, Copy)]
pub struct ImageRatioStrategy {
  ratio: AspectRatio,
}

impl ImageRatioStrategy {
  pub fn new(ratio: AspectRatio) -> Self {
    Self { ratio }
  }

  async fn process_attachment(
    &self,
    row: &RowContext<'_>,
    name: &str,
    url: &str,
    reporter: &mut ProgressReporter,
  ) -> Result<UploadFile, RowError> {
    reporter.append_log(LogEntry::info(format!("downloading: {}", name)));
    let source = row.policy.bounded(row.fetcher.fetch(url)).await?;
    debug!(name, bytes = source.len(), "attachment downloaded");

    reporter.append_log(LogEntry::info(format!("adjusting ratio: {}", name)));
    let ratio = self.ratio;
    let content = tokio::task::spawn_blocking(move || crop_to_ratio(&source, ratio))
      .await
      .map_err(|e| RowError::Panicked(e.to_string()))??;

    Ok(UploadFile {
      name: output_file_name(name, ratio),
      mime_type: OUTPUT_MIME.to_string(),
      content,
    })
  }
}

fn display_name(attachment: &Attachment) -> &str {
  if attachment.name.trim().is_empty() {
    DEFAULT_IMAGE_NAME
  } else {
    &attachment.name
  }
}

#[async_trait]
impl TransformStrategy for ImageRatioStrategy {
  fn name(&self) -> &'static str {
    "image_ratio"
  }

  #[instrument(level = "trace", skip_all, fields(record = %row.record, ratio = %self.ratio))]
  async fn transform(
    &self,
    row: &RowContext<'_>,
    value: FieldValue,
    reporter: &mut ProgressReporter,
  ) -> Result<TransformOutcome, RowError> {
    let attachments = value.attachments();
    if attachments.is_empty() {
      return Ok(TransformOutcome::skip("no attachments"));
    }
    reporter.append_log(LogEntry::info(format!(
      "row {}: {} attachment(s)",
      row.ordinal,
      attachments.len()
    )));

    let tokens: Vec<String> = attachments.iter().map(|a| a.token.clone()).collect();
    let urls = row
      .policy
      .bounded(row.table.resolve_attachment_urls(
        row.table_id,
        row.source_field_id,
        row.record,
        &tokens,
      ))
      .await?;
    if urls.len() != tokens.len() {
      return Err(RowError::Table(TableError::Backend(format!(
        "expected {} attachment url(s), got {}",
        tokens.len(),
        urls.len()
      ))));
    }

    let mut processed = Vec::new();
    let mut last_error: Option<String> = None;
    for (attachment, url) in attachments.iter().zip(&urls) {
      let name = display_name(attachment);
      if !is_image_name(name) {
        reporter.append_log(LogEntry::info(format!("skipping non-image file: {}", name)));
        continue;
      }
      match self.process_attachment(row, name, url, reporter).await {
        Ok(file) => {
          reporter.append_log(LogEntry::success(format!("processed: {}", file.name)));
          processed.push(file);
        }
        Err(e) => {
          reporter.append_log(LogEntry::error(format!("attachment failed: {} - {}", name, e)));
          last_error = Some(e.to_string());
        }
      }
    }

    if processed.is_empty() {
      return Ok(match last_error {
        Some(reason) => TransformOutcome::Fail(reason),
        None => TransformOutcome::skip("no image attachments"),
      });
    }
    reporter.append_log(LogEntry::info(format!(
      "uploading {} file(s) to target field",
      processed.len()
    )));
    Ok(TransformOutcome::Success(FieldWrite::Files(processed)))
  }
}
