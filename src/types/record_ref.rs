//! Opaque identifier of one row in the external table.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier of one row in the external table.
///
/// Supplied by the table collaborator; unique within the snapshot taken at run start.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordRef(String);

impl RecordRef {
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for RecordRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for RecordRef {
  fn from(s: &str) -> Self {
    Self::new(s)
  }
}
