//! Error taxonomy for a batch run.
//!
//! [PreconditionError] aborts a run before the first record is touched.
//! [RowError] is caught per record and folded into a `Fail` outcome.

use thiserror::Error;

/// Failure reported by the external table collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TableError {
  #[error("table not found: {0}")]
  TableNotFound(String),
  #[error("field not found: {0}")]
  FieldNotFound(String),
  #[error("record not found: {0}")]
  RecordNotFound(String),
  #[error("table backend error: {0}")]
  Backend(String),
}

/// Failure while downloading attachment content.
#[derive(Debug, Error)]
pub enum FetchError {
  #[error("download failed: {status} {reason}")]
  Status { status: u16, reason: String },
  #[error("download failed: {0}")]
  Transport(String),
  #[error("read failed: {0}")]
  Io(#[from] std::io::Error),
  #[error("unsupported attachment url: {0}")]
  UnsupportedUrl(String),
}

/// Failure while cropping or re-encoding an image.
#[derive(Debug, Error)]
pub enum GeometryError {
  #[error("image has a zero dimension ({width}x{height})")]
  ZeroDimension { width: u32, height: u32 },
  #[error("aspect ratio must be positive and finite, got {width}:{height}")]
  InvalidRatio { width: f64, height: f64 },
  #[error("failed to decode image: {0}")]
  Decode(#[source] image::ImageError),
  #[error("failed to encode image: {0}")]
  Encode(#[source] image::ImageError),
}

/// Fatal condition detected before the per-record loop starts.
#[derive(Debug, Error)]
pub enum PreconditionError {
  #[error("missing required selection: {0}")]
  MissingSelection(&'static str),
  #[error("aspect ratio must be positive and finite, got {width}:{height}")]
  InvalidRatio { width: f64, height: f64 },
  #[error("table {0} has no records")]
  NoRecords(String),
  #[error("mapping table contains no usable name/user pairs")]
  EmptyMapping,
  #[error("mapping table contains duplicate name \"{0}\"")]
  DuplicateKey(String),
  #[error("a run is already in progress")]
  AlreadyRunning,
  #[error("timed out while preparing the run")]
  Timeout,
  #[error(transparent)]
  Table(#[from] TableError),
}

/// Error raised while processing a single record.
#[derive(Debug, Error)]
pub enum RowError {
  #[error(transparent)]
  Table(#[from] TableError),
  #[error(transparent)]
  Fetch(#[from] FetchError),
  #[error(transparent)]
  Geometry(#[from] GeometryError),
  #[error("timeout")]
  Timeout,
  #[error("write rejected")]
  WriteRejected,
  #[error("transform panicked: {0}")]
  Panicked(String),
}
