//! Normalized-name → user lookup built once per run from the mapping table.

use std::collections::HashMap;

use super::UserRef;

/// How a repeated normalized key in the mapping table is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
  /// The row read last wins. Rows are read in table order, so this is deterministic.
  #[default]
  LastWins,
  /// The row read first wins; later duplicates are ignored.
  FirstWins,
  /// Any duplicate aborts index construction.
  Reject,
}

/// Normalized-name → user lookup. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityIndex {
  entries: HashMap<String, UserRef>,
  duplicate_keys: Vec<String>,
  excluded_rows: usize,
}

impl IdentityIndex {
  pub(crate) fn from_parts(
    entries: HashMap<String, UserRef>,
    duplicate_keys: Vec<String>,
    excluded_rows: usize,
  ) -> Self {
    Self {
      entries,
      duplicate_keys,
      excluded_rows,
    }
  }

  /// Looks up an already-normalized key.
  pub fn get(&self, key: &str) -> Option<&UserRef> {
    self.entries.get(key)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Keys that appeared on more than one usable row, in first-repeat order.
  pub fn duplicate_keys(&self) -> &[String] {
    &self.duplicate_keys
  }

  /// Rows dropped for lacking a usable name or user.
  pub fn excluded_rows(&self) -> usize {
    self.excluded_rows
  }
}

impl std::str::FromStr for DuplicatePolicy {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "last" | "last-wins" => Ok(DuplicatePolicy::LastWins),
      "first" | "first-wins" => Ok(DuplicatePolicy::FirstWins),
      "reject" => Ok(DuplicatePolicy::Reject),
      other => Err(format!("unknown duplicate policy: {}", other)),
    }
  }
}
