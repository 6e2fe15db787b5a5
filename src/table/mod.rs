//! The external table platform, seen from the engine.
//!
//! [TableClient] is the collaborator seam; [MemoryTable] is the in-process
//! implementation backed by a JSON-serializable [TableSnapshot].

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TableError;
use crate::types::{FieldValue, FieldWrite, RecordRef};

mod memory;

pub use memory::{MEMORY_SCHEME, MemoryTable, RecordSnapshot, TableSnapshot, TableSnapshotEntry};

/// Column type as far as the engine cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
  Text,
  User,
  Attachment,
  Other,
}

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMeta {
  pub id: String,
  pub name: String,
  pub kind: FieldKind,
}

/// Table metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMeta {
  pub id: String,
  pub name: String,
}

/// One record of the mapping table with all of its cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuxRow {
  pub record: RecordRef,
  pub fields: HashMap<String, FieldValue>,
}

/// One page of records.
#[derive(Debug, Clone, Default)]
pub struct RecordPage {
  pub records: Vec<AuxRow>,
  /// Token for the next page when `has_more` is true.
  pub page_token: Option<String>,
  pub has_more: bool,
}

/// Capabilities the engine needs from the host table platform.
#[async_trait]
pub trait TableClient: Send + Sync {
  async fn list_tables(&self) -> Result<Vec<TableMeta>, TableError>;

  /// Fields of `table_id`, optionally restricted to one kind.
  async fn list_fields(
    &self,
    table_id: &str,
    kind: Option<FieldKind>,
  ) -> Result<Vec<FieldMeta>, TableError>;

  /// Ordered record ids at the time of the call.
  async fn list_record_ids(&self, table_id: &str) -> Result<Vec<RecordRef>, TableError>;

  async fn get_field_value(
    &self,
    table_id: &str,
    field_id: &str,
    record: &RecordRef,
  ) -> Result<FieldValue, TableError>;

  /// Replaces the cell content. `Ok(false)` means the platform rejected the write.
  async fn set_field_value(
    &self,
    table_id: &str,
    field_id: &str,
    record: &RecordRef,
    value: FieldWrite,
  ) -> Result<bool, TableError>;

  async fn list_records_page(
    &self,
    table_id: &str,
    page_size: usize,
    page_token: Option<String>,
  ) -> Result<RecordPage, TableError>;

  /// Download URLs for attachment tokens of one cell, in token order.
  async fn resolve_attachment_urls(
    &self,
    table_id: &str,
    field_id: &str,
    record: &RecordRef,
    tokens: &[String],
  ) -> Result<Vec<String>, TableError>;
}
