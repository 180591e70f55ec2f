//! Data types produced by the scoring pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{ClassKey, StudentId};

/// Traffic-light risk status of an enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Red,
    Yellow,
    Green,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Red => "red",
            Status::Yellow => "yellow",
            Status::Green => "green",
        };
        f.pad(s)
    }
}

/// Weighted score of one enrollment and how much of it was graded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub score: f64,
    pub graded_goals: usize,
    pub total_goals: usize,
}

impl ScoreBreakdown {
    pub fn is_partial(&self) -> bool {
        self.graded_goals < self.total_goals
    }
}

/// Derived view of one enrollment, recomputed on every request.
///
/// `score` and `status` are `None` while no goal has been evaluated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrollmentStatus {
    pub class: ClassKey,
    pub student_id: StudentId,
    pub student_name: String,
    pub score: Option<f64>,
    pub graded_goals: usize,
    pub total_goals: usize,
    pub failed_prior: bool,
    pub status: Option<Status>,
}

impl EnrollmentStatus {
    pub fn is_computable(&self) -> bool {
        self.status.is_some()
    }
}
