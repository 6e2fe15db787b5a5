//! Value written into the target field of a record.

use bytes::Bytes;

use super::UserRef;

/// A newly produced file to upload into an attachment field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
  pub name: String,
  pub mime_type: String,
  pub content: Bytes,
}

/// Value written into the target field. Replaces the cell content as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldWrite {
  Users(Vec<UserRef>),
  Files(Vec<UploadFile>),
}

impl FieldWrite {
  /// Short summary for log lines.
  pub fn describe(&self) -> String {
    match self {
      FieldWrite::Users(users) => {
        let ids: Vec<&str> = users.iter().map(|u| u.id.as_str()).collect();
        format!("user(s) {}", ids.join(", "))
      }
      FieldWrite::Files(files) => format!("{} file(s)", files.len()),
    }
  }
}
