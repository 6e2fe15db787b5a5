//! Resolves a free-text name to a user through the prebuilt [IdentityIndex].

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{RowContext, TransformStrategy};
use crate::error::RowError;
use crate::reporter::ProgressReporter;
use crate::types::{FieldValue, FieldWrite, IdentityIndex, TransformOutcome, normalize_key};

/// Looks up the normalized source text in the index. Hit writes `[user]`, miss fails the row.
#[derive(Debug, Clone)]
pub struct NameResolutionStrategy {
  index: Arc<IdentityIndex>,
}

impl NameResolutionStrategy {
  pub fn new(index: Arc<IdentityIndex>) -> Self {
    Self { index }
  }

  /// The decision alone, without any I/O.
  pub fn resolve(&self, value: &FieldValue) -> TransformOutcome {
    let key = normalize_key(value);
    if key.is_empty() {
      return TransformOutcome::skip("empty name");
    }
    match self.index.get(&key) {
      Some(user) => TransformOutcome::Success(FieldWrite::Users(vec![user.clone()])),
      None => TransformOutcome::fail("unmapped name"),
    }
  }
}

#[async_trait]
impl TransformStrategy for NameResolutionStrategy {
  fn name(&self) -> &'static str {
    "name_resolution"
  }

  #[instrument(level = "trace", skip_all, fields(record = %row.record))]
  async fn transform(
    &self,
    row: &RowContext<'_>,
    value: FieldValue,
    _reporter: &mut ProgressReporter,
  ) -> Result<TransformOutcome, RowError> {
    let outcome = self.resolve(&value);
    debug!(kind = %outcome.kind(), "name resolved");
    Ok(outcome)
  }
}
