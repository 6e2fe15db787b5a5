//! Per-record result of a transform strategy.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::FieldWrite;

/// Per-record result of a transform strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformOutcome {
  /// Write this value to the target field.
  Success(FieldWrite),
  /// Nothing to do for this record; not an error.
  Skip(String),
  /// The record could not be transformed.
  Fail(String),
}

impl TransformOutcome {
  pub fn skip(reason: impl Into<String>) -> Self {
    TransformOutcome::Skip(reason.into())
  }

  pub fn fail(reason: impl Into<String>) -> Self {
    TransformOutcome::Fail(reason.into())
  }

  pub fn kind(&self) -> OutcomeKind {
    match self {
      TransformOutcome::Success(_) => OutcomeKind::Success,
      TransformOutcome::Skip(_) => OutcomeKind::Skip,
      TransformOutcome::Fail(_) => OutcomeKind::Fail,
    }
  }
}

/// Counter bucket an outcome falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
  Success,
  Skip,
  Fail,
}

impl fmt::Display for OutcomeKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      OutcomeKind::Success => write!(f, "success"),
      OutcomeKind::Skip => write!(f, "skip"),
      OutcomeKind::Fail => write!(f, "fail"),
    }
  }
}
