//! Bulk grade import from a tabular sheet into one class.

mod pipeline;
mod report;

pub use pipeline::{CancelHandle, ColumnBinding, ColumnMapping, ImportPipeline, ImportState};
pub use report::{ImportReport, RowFailure, RowFailureReason, RowOutcome};
