//! In-process table backed by a [TableSnapshot].
//!
//! Used by tests and by the `run_batch` binary, which loads the snapshot from JSON.
//! Uploaded files get fresh tokens and are served back under `memory://<token>`
//! until [MemoryTable::persist_uploads] writes them to disk.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use super::{AuxRow, FieldKind, FieldMeta, RecordPage, TableClient, TableMeta};
use crate::error::{FetchError, TableError};
use crate::fetch::AttachmentFetcher;
use crate::types::{Attachment, FieldValue, FieldWrite, RecordRef};

/// URL scheme served by [MemoryTable] for blobs it holds.
pub const MEMORY_SCHEME: &str = "memory://";

/// One record of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSnapshot {
  pub id: RecordRef,
  #[serde(default)]
  pub fields: BTreeMap<String, FieldValue>,
}

/// One table of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSnapshotEntry {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub fields: Vec<FieldMeta>,
  #[serde(default)]
  pub records: Vec<RecordSnapshot>,
}

/// Whole-base snapshot: every table with its fields and records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSnapshot {
  #[serde(default)]
  pub tables: Vec<TableSnapshotEntry>,
}

impl TableSnapshot {
  /// Adds an empty table with the given `(field id, kind)` columns. Field names equal ids.
  pub fn with_table(mut self, id: &str, name: &str, fields: &[(&str, FieldKind)]) -> Self {
    self.tables.push(TableSnapshotEntry {
      id: id.to_string(),
      name: name.to_string(),
      fields: fields
        .iter()
        .map(|(fid, kind)| FieldMeta {
          id: (*fid).to_string(),
          name: (*fid).to_string(),
          kind: *kind,
        })
        .collect(),
      records: Vec::new(),
    });
    self
  }

  /// Appends a record to table `table_id`. Unknown tables are ignored.
  pub fn with_record(mut self, table_id: &str, record_id: &str, cells: Vec<(&str, FieldValue)>) -> Self {
    if let Some(t) = self.tables.iter_mut().find(|t| t.id == table_id) {
      t.records.push(RecordSnapshot {
        id: RecordRef::new(record_id),
        fields: cells
          .into_iter()
          .map(|(k, v)| (k.to_string(), v))
          .collect(),
      });
    }
    self
  }

  fn table(&self, table_id: &str) -> Result<&TableSnapshotEntry, TableError> {
    self
      .tables
      .iter()
      .find(|t| t.id == table_id)
      .ok_or_else(|| TableError::TableNotFound(table_id.to_string()))
  }

  fn table_mut(&mut self, table_id: &str) -> Result<&mut TableSnapshotEntry, TableError> {
    self
      .tables
      .iter_mut()
      .find(|t| t.id == table_id)
      .ok_or_else(|| TableError::TableNotFound(table_id.to_string()))
  }
}

impl TableSnapshotEntry {
  fn require_field(&self, field_id: &str) -> Result<(), TableError> {
    if self.fields.iter().any(|f| f.id == field_id) {
      Ok(())
    } else {
      Err(TableError::FieldNotFound(field_id.to_string()))
    }
  }

  fn record(&self, record: &RecordRef) -> Result<&RecordSnapshot, TableError> {
    self
      .records
      .iter()
      .find(|r| &r.id == record)
      .ok_or_else(|| TableError::RecordNotFound(record.to_string()))
  }

  fn record_mut(&mut self, record: &RecordRef) -> Result<&mut RecordSnapshot, TableError> {
    self
      .records
      .iter_mut()
      .find(|r| &r.id == record)
      .ok_or_else(|| TableError::RecordNotFound(record.to_string()))
  }
}

#[derive(Debug, Default)]
struct Inner {
  snapshot: TableSnapshot,
  blobs: HashMap<String, Bytes>,
  pending_uploads: Vec<String>,
  rejected: HashSet<RecordRef>,
  writes: usize,
}

/// In-process [TableClient].
#[derive(Debug, Default)]
pub struct MemoryTable {
  inner: Mutex<Inner>,
  base_dir: Option<PathBuf>,
}

impl MemoryTable {
  pub fn new(snapshot: TableSnapshot) -> Self {
    Self {
      inner: Mutex::new(Inner {
        snapshot,
        ..Inner::default()
      }),
      base_dir: None,
    }
  }

  /// Directory that relative attachment URLs in the snapshot are resolved against.
  pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.base_dir = Some(dir.into());
    self
  }

  /// Registers blob content for `token`, served as `memory://<token>`.
  pub fn with_blob(mut self, token: &str, content: impl Into<Bytes>) -> Self {
    self
      .inner
      .get_mut()
      .blobs
      .insert(token.to_string(), content.into());
    self
  }

  /// Makes every write to `record` report rejection.
  pub fn reject_writes_for(mut self, record: &str) -> Self {
    self.inner.get_mut().rejected.insert(RecordRef::new(record));
    self
  }

  pub async fn snapshot(&self) -> TableSnapshot {
    self.inner.lock().await.snapshot.clone()
  }

  /// Number of accepted writes so far.
  pub async fn write_count(&self) -> usize {
    self.inner.lock().await.writes
  }

  pub async fn blob(&self, token: &str) -> Option<Bytes> {
    self.inner.lock().await.blobs.get(token).cloned()
  }

  /// Writes uploaded blobs to `dir` as `<token>-<name>` and points their attachments at the file.
  /// Path separators and `..` in the name are replaced. Uploads stay pending until every
  /// file is written. Returns the number of files written.
  #[instrument(level = "trace", skip(self, dir))]
  pub async fn persist_uploads(&self, dir: &Path) -> Result<usize, std::io::Error> {
    let mut inner = self.inner.lock().await;
    if inner.pending_uploads.is_empty() {
      return Ok(0);
    }
    tokio::fs::create_dir_all(dir).await?;
    let mut paths: HashMap<String, String> = HashMap::new();
    for token in &inner.pending_uploads {
      let Some(content) = inner.blobs.get(token) else {
        continue;
      };
      let name = attachment_name(&inner.snapshot, token).unwrap_or_default();
      let path = dir.join(blob_file_name(token, &name));
      tokio::fs::write(&path, content).await?;
      paths.insert(token.clone(), path.display().to_string());
    }
    inner.pending_uploads.clear();
    for table in &mut inner.snapshot.tables {
      for record in &mut table.records {
        for value in record.fields.values_mut() {
          if let FieldValue::Attachments(files) = value {
            for file in files.iter_mut() {
              if let Some(path) = paths.get(&file.token) {
                file.url = Some(path.clone());
              }
            }
          }
        }
      }
    }
    debug!(files = paths.len(), dir = %dir.display(), "uploads persisted");
    Ok(paths.len())
  }

  fn resolve_url(&self, attachment: &Attachment) -> String {
    match &attachment.url {
      Some(url) if url.contains("://") => url.clone(),
      Some(path) => match &self.base_dir {
        Some(base) if Path::new(path).is_relative() => base.join(path).display().to_string(),
        _ => path.clone(),
      },
      None => format!("{}{}", MEMORY_SCHEME, attachment.token),
    }
  }
}

fn attachment_name(snapshot: &TableSnapshot, token: &str) -> Option<String> {
  snapshot
    .tables
    .iter()
    .flat_map(|t| t.records.iter())
    .flat_map(|r| r.fields.values())
    .flat_map(|v| v.attachments().iter())
    .find(|a| a.token == token)
    .map(|a| a.name.clone())
}

/// On-disk name for an uploaded blob; the display name never leaves `dir`.
pub(crate) fn blob_file_name(token: &str, name: &str) -> String {
  let safe = name.replace("..", "_").replace(['/', '\\'], "_");
  format!("{}-{}", token, safe)
}

#[async_trait]
impl TableClient for MemoryTable {
  async fn list_tables(&self) -> Result<Vec<TableMeta>, TableError> {
    let inner = self.inner.lock().await;
    Ok(
      inner
        .snapshot
        .tables
        .iter()
        .map(|t| TableMeta {
          id: t.id.clone(),
          name: t.name.clone(),
        })
        .collect(),
    )
  }

  async fn list_fields(
    &self,
    table_id: &str,
    kind: Option<FieldKind>,
  ) -> Result<Vec<FieldMeta>, TableError> {
    let inner = self.inner.lock().await;
    let table = inner.snapshot.table(table_id)?;
    Ok(
      table
        .fields
        .iter()
        .filter(|f| kind.is_none_or(|k| f.kind == k))
        .cloned()
        .collect(),
    )
  }

  async fn list_record_ids(&self, table_id: &str) -> Result<Vec<RecordRef>, TableError> {
    let inner = self.inner.lock().await;
    let table = inner.snapshot.table(table_id)?;
    Ok(table.records.iter().map(|r| r.id.clone()).collect())
  }

  async fn get_field_value(
    &self,
    table_id: &str,
    field_id: &str,
    record: &RecordRef,
  ) -> Result<FieldValue, TableError> {
    let inner = self.inner.lock().await;
    let table = inner.snapshot.table(table_id)?;
    table.require_field(field_id)?;
    let row = table.record(record)?;
    Ok(row.fields.get(field_id).cloned().unwrap_or_default())
  }

  async fn set_field_value(
    &self,
    table_id: &str,
    field_id: &str,
    record: &RecordRef,
    value: FieldWrite,
  ) -> Result<bool, TableError> {
    let mut inner = self.inner.lock().await;
    {
      let table = inner.snapshot.table(table_id)?;
      table.require_field(field_id)?;
      table.record(record)?;
    }
    if inner.rejected.contains(record) {
      return Ok(false);
    }

    let cell = match value {
      FieldWrite::Users(users) => FieldValue::UserRefs(users),
      FieldWrite::Files(files) => {
        let mut attachments = Vec::with_capacity(files.len());
        for file in files {
          let token = uuid::Uuid::new_v4().simple().to_string();
          inner.blobs.insert(token.clone(), file.content);
          inner.pending_uploads.push(token.clone());
          attachments.push(Attachment {
            token,
            name: file.name,
            mime_type: Some(file.mime_type),
            url: None,
          });
        }
        FieldValue::Attachments(attachments)
      }
    };

    let row = inner.snapshot.table_mut(table_id)?.record_mut(record)?;
    row.fields.insert(field_id.to_string(), cell);
    inner.writes += 1;
    Ok(true)
  }

  async fn list_records_page(
    &self,
    table_id: &str,
    page_size: usize,
    page_token: Option<String>,
  ) -> Result<RecordPage, TableError> {
    let inner = self.inner.lock().await;
    let table = inner.snapshot.table(table_id)?;
    let offset = match page_token {
      Some(t) => t
        .parse::<usize>()
        .map_err(|_| TableError::Backend(format!("invalid page token {:?}", t)))?,
      None => 0,
    };
    let page_size = page_size.max(1);
    let end = offset.saturating_add(page_size).min(table.records.len());
    let records = table.records[offset.min(end)..end]
      .iter()
      .map(|r| AuxRow {
        record: r.id.clone(),
        fields: r
          .fields
          .iter()
          .map(|(k, v)| (k.clone(), v.clone()))
          .collect(),
      })
      .collect();
    let has_more = end < table.records.len();
    Ok(RecordPage {
      records,
      page_token: has_more.then(|| end.to_string()),
      has_more,
    })
  }

  async fn resolve_attachment_urls(
    &self,
    table_id: &str,
    field_id: &str,
    record: &RecordRef,
    tokens: &[String],
  ) -> Result<Vec<String>, TableError> {
    let inner = self.inner.lock().await;
    let table = inner.snapshot.table(table_id)?;
    table.require_field(field_id)?;
    let row = table.record(record)?;
    let cell = row.fields.get(field_id).cloned().unwrap_or_default();
    tokens
      .iter()
      .map(|token| {
        cell
          .attachments()
          .iter()
          .find(|a| &a.token == token)
          .map(|a| self.resolve_url(a))
          .ok_or_else(|| TableError::Backend(format!("unknown attachment token {}", token)))
      })
      .collect()
  }
}

#[async_trait]
impl AttachmentFetcher for MemoryTable {
  async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
    let token = url
      .strip_prefix(MEMORY_SCHEME)
      .ok_or_else(|| FetchError::UnsupportedUrl(url.to_string()))?;
    self
      .inner
      .lock()
      .await
      .blobs
      .get(token)
      .cloned()
      .ok_or(FetchError::Status {
        status: 404,
        reason: "Not Found".to_string(),
      })
  }
}
