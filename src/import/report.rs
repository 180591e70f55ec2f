//! Outcome of an applied import batch.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::model::{ClassKey, StudentId};

/// Why a single row could not be applied.
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowFailureReason {
    #[error("national ID cell is empty")]
    MissingStudentId,

    #[error("national ID '{value}' is not valid")]
    InvalidStudentId { value: String },

    #[error("student {student} is not registered")]
    UnknownStudent { student: String },

    #[error("student {student} is not enrolled in this class")]
    NotEnrolled { student: String },

    #[error("column '{column}' ({goal}) holds '{value}', which is not a concept of this class")]
    UnknownConcept {
        column: String,
        goal: String,
        value: String,
    },

    /// An earlier row for the same student grades one of these goals differently.
    #[error("conflicts with the row at line {first_line} for the same student")]
    DuplicateRow { first_line: u64 },
}

/// A row that was recorded as failed. Sibling rows are unaffected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowFailure {
    pub line: u64,
    pub student_id: Option<String>,
    pub reason: RowFailureReason,
}

/// What happened to one input row. Every row gets exactly one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RowOutcome {
    /// At least one grade was written or changed.
    Applied {
        line: u64,
        student_id: StudentId,
        written: usize,
    },
    /// Every grade in the row was already stored (or the row had no grades).
    SkippedDuplicate { line: u64, student_id: StudentId },
    /// Every mapped cell of the row was blank.
    SkippedEmpty { line: u64, student_id: StudentId },
    Failed(RowFailure),
}

impl RowOutcome {
    pub fn line(&self) -> u64 {
        match self {
            RowOutcome::Applied { line, .. }
            | RowOutcome::SkippedDuplicate { line, .. }
            | RowOutcome::SkippedEmpty { line, .. } => *line,
            RowOutcome::Failed(failure) => failure.line,
        }
    }
}

/// Summary returned once an import batch reaches `Completed`.
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub class: ClassKey,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_rows: usize,
    pub applied: usize,
    pub duplicates: usize,
    pub empty: usize,
    pub failed: usize,
    pub evaluations_written: usize,
    pub rows: Vec<RowOutcome>,
}

impl ImportReport {
    pub(crate) fn from_outcomes(
        class: ClassKey,
        started_at: DateTime<Utc>,
        mut rows: Vec<RowOutcome>,
    ) -> Self {
        rows.sort_by_key(RowOutcome::line);

        let mut report = ImportReport {
            class,
            started_at,
            finished_at: Utc::now(),
            total_rows: rows.len(),
            applied: 0,
            duplicates: 0,
            empty: 0,
            failed: 0,
            evaluations_written: 0,
            rows: Vec::new(),
        };

        for row in &rows {
            match row {
                RowOutcome::Applied { written, .. } => {
                    report.applied += 1;
                    report.evaluations_written += written;
                }
                RowOutcome::SkippedDuplicate { .. } => report.duplicates += 1,
                RowOutcome::SkippedEmpty { .. } => report.empty += 1,
                RowOutcome::Failed(_) => report.failed += 1,
            }
        }
        report.rows = rows;
        report
    }

    /// Row-level failures in line order.
    pub fn failures(&self) -> impl Iterator<Item = &RowFailure> {
        self.rows.iter().filter_map(|row| match row {
            RowOutcome::Failed(failure) => Some(failure),
            _ => None,
        })
    }
}
