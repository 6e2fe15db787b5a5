//! Pluggable per-record transforms.
//!
//! A [TransformStrategy] receives the source cell of one record and decides
//! whether to write a new value, skip the record, or fail it.

use async_trait::async_trait;

use crate::error::RowError;
use crate::fetch::AttachmentFetcher;
use crate::pipeline::CallPolicy;
use crate::reporter::ProgressReporter;
use crate::table::TableClient;
use crate::types::{FieldValue, RecordRef, TransformOutcome};

mod image_ratio;
#[cfg(test)]
mod image_ratio_test;
mod name_resolution;

pub use image_ratio::{DEFAULT_IMAGE_NAME, ImageRatioStrategy, is_image_name};
pub use name_resolution::NameResolutionStrategy;

/// Everything a strategy may consult about the record being processed.
pub struct RowContext<'a> {
  pub table: &'a dyn TableClient,
  pub fetcher: &'a dyn AttachmentFetcher,
  pub table_id: &'a str,
  pub source_field_id: &'a str,
  pub record: &'a RecordRef,
  /// 1-based position of the record in the run.
  pub ordinal: usize,
  pub policy: &'a CallPolicy,
}

/// Per-record transform invoked by the pipeline.
///
/// Returning `Err` is equivalent to `Ok(TransformOutcome::Fail(err.to_string()))`.
#[async_trait]
pub trait TransformStrategy: Send + Sync {
  fn name(&self) -> &'static str;

  async fn transform(
    &self,
    row: &RowContext<'_>,
    value: FieldValue,
    reporter: &mut ProgressReporter,
  ) -> Result<TransformOutcome, RowError>;
}
