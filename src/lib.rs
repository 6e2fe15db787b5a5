//! # rowforge
//!
//! Sequential batch transformation of records in an external table.
//!
//! ## Architecture
//!
//! A [BatchRunner] takes an explicit [RunConfig], validates it, prepares the
//! strategy (for name resolution this means building an [IdentityIndex] from the
//! mapping table) and then walks every record in order:
//!
//! read source cell → [TransformStrategy::transform] → write target cell → record outcome.
//!
//! Progress is published as [RunState] snapshots on a watch channel
//! ([ProgressChannel]); the run ends with a [Summary] and a [RunReport].
//!
//! Strategies: [ImageRatioStrategy] (center-crop image attachments to a ratio) and
//! [NameResolutionStrategy] (resolve a free-text name to a user reference).

pub mod error;
pub mod fetch;
pub mod geometry;
pub mod index_builder;
pub mod pipeline;
pub mod reporter;
#[cfg(test)]
mod reporter_test;
pub mod run_log_io;
pub mod runner;
#[cfg(test)]
mod runner_test;
pub mod snapshot_io;
pub mod strategies;
pub mod table;
pub mod types;

pub use error::{FetchError, GeometryError, PreconditionError, RowError, TableError};
pub use fetch::{AttachmentFetcher, DefaultFetcher};
pub use reporter::{ProgressChannel, ProgressReporter};
pub use runner::{BatchRunner, RunOptions, RunResult};
pub use strategies::{ImageRatioStrategy, NameResolutionStrategy, RowContext, TransformStrategy};
pub use table::{MemoryTable, TableClient, TableSnapshot};
pub use types::{
  AspectRatio, FieldValue, IdentityIndex, MappingConfig, RunConfig, RunReport, RunState,
  StrategyConfig, Summary, TransformOutcome,
};
