//! Builds the [IdentityIndex] from the mapping table.
//!
//! Each mapping row contributes `normalize(name) → first user` when both sides are
//! usable; other rows are dropped silently. An index with no entries is a hard
//! precondition failure.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use tracing::{debug, instrument, warn};

use crate::error::PreconditionError;
use crate::pipeline::{CallPolicy, Timed};
use crate::table::{AuxRow, TableClient};
use crate::types::{DuplicatePolicy, FieldValue, IdentityIndex, MappingConfig, UserRef, normalize_key};

/// Builds an index from already-loaded mapping rows, in row order.
#[instrument(level = "trace", skip(rows))]
pub fn build_identity_index<'a>(
  rows: impl IntoIterator<Item = &'a AuxRow>,
  name_field_id: &str,
  user_field_id: &str,
  policy: DuplicatePolicy,
) -> Result<IdentityIndex, PreconditionError> {
  let mut entries: HashMap<String, UserRef> = HashMap::new();
  let mut duplicate_keys: Vec<String> = Vec::new();
  let mut excluded = 0usize;

  for row in rows {
    let key = row
      .fields
      .get(name_field_id)
      .map(normalize_key)
      .unwrap_or_default();
    let user_id = row.fields.get(user_field_id).and_then(FieldValue::first_user_id);

    let user_id = match user_id {
      Some(id) if !key.is_empty() => id.to_string(),
      _ => {
        excluded += 1;
        continue;
      }
    };

    match entries.entry(key) {
      Entry::Vacant(slot) => {
        slot.insert(UserRef::new(user_id));
      }
      Entry::Occupied(mut slot) => {
        let key = slot.key().clone();
        warn!(key = %key, record = %row.record, "duplicate name in mapping table");
        match policy {
          DuplicatePolicy::LastWins => {
            slot.insert(UserRef::new(user_id));
          }
          DuplicatePolicy::FirstWins => {}
          DuplicatePolicy::Reject => return Err(PreconditionError::DuplicateKey(key)),
        }
        if !duplicate_keys.contains(&key) {
          duplicate_keys.push(key);
        }
      }
    }
  }

  if entries.is_empty() {
    return Err(PreconditionError::EmptyMapping);
  }
  debug!(entries = entries.len(), excluded, "identity index built");
  Ok(IdentityIndex::from_parts(entries, duplicate_keys, excluded))
}

/// Reads the mapping table page by page and builds the index.
#[instrument(level = "trace", skip(table, policy))]
pub async fn load_identity_index(
  table: &dyn TableClient,
  mapping: &MappingConfig,
  policy: &CallPolicy,
) -> Result<IdentityIndex, PreconditionError> {
  let mut rows: Vec<AuxRow> = Vec::new();
  let mut page_token: Option<String> = None;
  loop {
    let page = policy
      .bounded(table.list_records_page(&mapping.table_id, mapping.page_size, page_token.take()))
      .await
      .map_err(|t| match t {
        Timed::Elapsed => PreconditionError::Timeout,
        Timed::Failed(e) => PreconditionError::Table(e),
      })?;
    debug!(rows = page.records.len(), has_more = page.has_more, "mapping page read");
    rows.extend(page.records);
    match (page.has_more, page.page_token) {
      (true, Some(next)) => page_token = Some(next),
      _ => break,
    }
  }
  build_identity_index(
    &rows,
    &mapping.name_field_id,
    &mapping.user_field_id,
    mapping.duplicate_policy,
  )
}
