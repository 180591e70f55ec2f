//! Error types for grading, evaluation writes and grade-sheet imports.
//!
//! Row-scoped import problems are not errors at this level: they are
//! collected into the [`ImportReport`](crate::import::ImportReport) as
//! [`RowFailure`](crate::import::RowFailure) entries.

use thiserror::Error;

use crate::import::ImportState;

/// Errors raised by the gradebook and the scoring pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GradingError {
    /// The grading specification is malformed (non-positive weight, duplicate symbol, ...).
    #[error("invalid grading specification: {0}")]
    Configuration(String),

    /// A concept symbol outside the class's concept weights.
    #[error("unknown concept '{concept}' (known: {known})")]
    UnknownConcept { concept: String, known: String },

    /// A goal name outside the class's goal weights.
    #[error("unknown goal '{0}'")]
    UnknownGoal(String),

    /// No goal has been evaluated yet, so no score can be computed.
    #[error("no evaluations recorded yet, score is not computable")]
    EmptyEvaluationSet,

    /// A class with the same topic, year and semester already exists.
    #[error("class {0} already exists")]
    DuplicateClass(String),

    /// A student with the same national ID is already registered.
    #[error("student {0} is already registered")]
    DuplicateStudent(String),

    #[error("class {0} not found")]
    UnknownClass(String),

    /// Class key text that is not `TOPIC-YEAR-SEMESTER`.
    #[error("invalid class key '{0}', expected TOPIC-YEAR-SEMESTER")]
    InvalidClassKey(String),

    #[error("student {0} not found")]
    UnknownStudent(String),

    /// The student exists but holds no enrollment in the class.
    #[error("student {student} is not enrolled in class {class}")]
    NotEnrolled { student: String, class: String },

    /// Missing or unusable student fields.
    #[error("invalid student: {0}")]
    InvalidStudent(String),
}

/// Errors that block an [`ImportPipeline`](crate::import::ImportPipeline) from
/// advancing to its next state.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The sheet has no header row.
    #[error("sheet is empty, no header row found")]
    EmptyFile,

    /// A detected column was neither bound nor explicitly ignored.
    #[error("column '{0}' is not mapped to a goal and not ignored")]
    UnmappedColumn(String),

    /// The mapping names a column the sheet does not have.
    #[error("column '{0}' does not exist in the sheet")]
    UnknownColumn(String),

    /// No column was designated as the student national ID.
    #[error("no column is mapped to the student national ID")]
    MissingIdColumn,

    #[error("more than one column is mapped to the student national ID")]
    DuplicateIdColumn,

    /// A column was bound to a goal the class does not grade.
    #[error("column '{column}' is bound to unknown goal '{goal}'")]
    UnknownGoal { column: String, goal: String },

    /// The operation is not valid in the pipeline's current state.
    #[error("cannot {action} while import is {state:?}")]
    InvalidState {
        action: &'static str,
        state: ImportState,
    },

    /// No reader variant handles this source.
    #[error("unsupported sheet format: {0}")]
    UnsupportedFormat(String),

    /// The caller cancelled the import before any write was applied.
    #[error("import cancelled")]
    Cancelled,

    /// The sheet could not be decoded.
    #[error("malformed sheet: {0}")]
    Malformed(String),

    #[error(transparent)]
    Grading(#[from] GradingError),
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::Malformed(err.to_string())
    }
}

impl ImportError {
    /// Returns `true` if the caller can fix the input and retry on the same pipeline.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ImportError::EmptyFile
                | ImportError::UnmappedColumn(_)
                | ImportError::UnknownColumn(_)
                | ImportError::MissingIdColumn
                | ImportError::DuplicateIdColumn
                | ImportError::UnknownGoal { .. }
                | ImportError::UnsupportedFormat(_)
                | ImportError::Malformed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_state_errors_are_retryable() {
        assert!(ImportError::EmptyFile.is_retryable());
        assert!(ImportError::UnmappedColumn("Nome".into()).is_retryable());
        assert!(!ImportError::Cancelled.is_retryable());
        assert!(!ImportError::Grading(GradingError::EmptyEvaluationSet).is_retryable());
    }

    #[test]
    fn test_grading_error_converts() {
        let err: ImportError = GradingError::UnknownClass("ESS-2025-1".into()).into();
        assert!(err.to_string().contains("ESS-2025-1"));
    }
}
