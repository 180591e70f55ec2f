//! Enrollment scoring and risk classification.
//!
//! Combines per-concept values and per-goal weights from a class's
//! [`GradingSpecification`](grading::GradingSpecification) into a weighted
//! score, then colors it Red/Yellow/Green, taking the student's record in
//! earlier offerings of the same topic into account.

pub mod aggregate;
pub mod grading;
pub mod history;
pub mod status;
pub mod types;
