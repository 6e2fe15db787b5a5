//! Data model of a batch run.
//!
//! Field values read from the table, values written back, per-record outcomes,
//! the identity index, and the run state observed by progress watchers.

mod field_value;
mod field_write;
mod identity_index;
#[cfg(test)]
mod identity_index_test;
mod log_entry;
mod record_ref;
mod run_config;
mod run_report;
mod run_state;
mod transform_outcome;

pub use field_value::{Attachment, FieldValue, TextSegment, UserRef, normalize_key};
pub use field_write::{FieldWrite, UploadFile};
pub use identity_index::{DuplicatePolicy, IdentityIndex};
pub use log_entry::{BoundedLog, LOG_CAPACITY, LogEntry, Severity};
pub use record_ref::RecordRef;
pub use run_config::{AspectRatio, DEFAULT_PAGE_SIZE, MappingConfig, RunConfig, StrategyConfig};
pub use run_report::{RUN_REPORT_VERSION, RunReport};
pub use run_state::{RunState, Summary};
pub use transform_outcome::{OutcomeKind, TransformOutcome};
