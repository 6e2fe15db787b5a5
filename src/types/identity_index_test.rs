//! Tests for `IdentityIndex`.

use std::collections::HashMap;

use super::{IdentityIndex, UserRef};

#[test]
fn get_and_len() {
  let mut entries = HashMap::new();
  entries.insert("alice".to_string(), UserRef::new("u1"));
  let index = IdentityIndex::from_parts(entries, vec!["alice".to_string()], 2);
  assert_eq!(index.len(), 1);
  assert!(!index.is_empty());
  assert_eq!(index.get("alice"), Some(&UserRef::new("u1")));
  assert_eq!(index.get("Alice"), None);
  assert_eq!(index.duplicate_keys(), ["alice".to_string()]);
  assert_eq!(index.excluded_rows(), 2);
}

#[test]
fn default_is_empty() {
  assert!(IdentityIndex::default().is_empty());
}
