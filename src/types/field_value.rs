//! Cell content as read from the external table.

use serde::{Deserialize, Serialize};

/// Maximum number of characters kept by [FieldValue::excerpt].
const EXCERPT_CHARS: usize = 40;

/// One styled run of text inside a rich-text cell. Style is irrelevant to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSegment {
  pub text: String,
}

/// Reference to a user/person recognized by the host platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserRef {
  pub id: String,
}

impl UserRef {
  pub fn new(id: impl Into<String>) -> Self {
    Self { id: id.into() }
  }
}

/// File referenced by a cell, addressed by an opaque token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
  pub token: String,
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub mime_type: Option<String>,
  /// Download location known to the table backend; resolved lazily otherwise.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub url: Option<String>,
}

/// Content of one cell.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
  #[default]
  Empty,
  PlainText(String),
  RichText(Vec<TextSegment>),
  UserRefs(Vec<UserRef>),
  Attachments(Vec<Attachment>),
}

impl FieldValue {
  pub fn text(s: impl Into<String>) -> Self {
    FieldValue::PlainText(s.into())
  }

  pub fn rich(segments: &[&str]) -> Self {
    FieldValue::RichText(
      segments
        .iter()
        .map(|s| TextSegment {
          text: (*s).to_string(),
        })
        .collect(),
    )
  }

  pub fn users(ids: &[&str]) -> Self {
    FieldValue::UserRefs(ids.iter().map(|id| UserRef::new(*id)).collect())
  }

  /// True for absent content: `Empty`, an empty string, or an empty list.
  ///
  /// Whitespace-only text is not empty here; strategies normalize it themselves.
  pub fn is_empty(&self) -> bool {
    match self {
      FieldValue::Empty => true,
      FieldValue::PlainText(s) => s.is_empty(),
      FieldValue::RichText(segs) => segs.iter().all(|s| s.text.is_empty()),
      FieldValue::UserRefs(users) => users.is_empty(),
      FieldValue::Attachments(files) => files.is_empty(),
    }
  }

  /// Raw text of a text cell; rich segments are concatenated in order. Non-text cells yield "".
  pub fn raw_text(&self) -> String {
    match self {
      FieldValue::PlainText(s) => s.clone(),
      FieldValue::RichText(segs) => segs.iter().map(|s| s.text.as_str()).collect(),
      FieldValue::Empty | FieldValue::UserRefs(_) | FieldValue::Attachments(_) => String::new(),
    }
  }

  /// Id of the first user in a user-list cell.
  pub fn first_user_id(&self) -> Option<&str> {
    match self {
      FieldValue::UserRefs(users) => users
        .first()
        .map(|u| u.id.as_str())
        .filter(|id| !id.is_empty()),
      _ => None,
    }
  }

  pub fn attachments(&self) -> &[Attachment] {
    match self {
      FieldValue::Attachments(files) => files,
      _ => &[],
    }
  }

  /// Short human-readable summary used in row log lines.
  pub fn excerpt(&self) -> String {
    match self {
      FieldValue::Empty => "(empty)".to_string(),
      FieldValue::PlainText(_) | FieldValue::RichText(_) => {
        let text = self.raw_text();
        let trimmed = text.trim();
        if trimmed.chars().count() > EXCERPT_CHARS {
          let cut: String = trimmed.chars().take(EXCERPT_CHARS).collect();
          format!("{}…", cut)
        } else {
          trimmed.to_string()
        }
      }
      FieldValue::UserRefs(users) => format!("{} user(s)", users.len()),
      FieldValue::Attachments(files) => format!("{} attachment(s)", files.len()),
    }
  }
}

/// Lookup key normalization: text content trimmed and lower-cased.
pub fn normalize_key(value: &FieldValue) -> String {
  value.raw_text().trim().to_lowercase()
}
