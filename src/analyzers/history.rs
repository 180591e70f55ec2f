//! Links an enrollment to the student's record in earlier offerings.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::{MIN_FAILED_RISK_GOALS, RISK_INDICATOR_GOALS};
use crate::model::{ClassKey, StudentId};

/// Grades a student received in one earlier offering.
#[derive(Debug, Clone)]
pub struct PriorEnrollment {
    pub class: ClassKey,
    /// Lowest concept symbol of that offering's grading specification.
    pub lowest_concept: String,
    pub evaluations: BTreeMap<String, String>,
}

impl PriorEnrollment {
    /// At least [`MIN_FAILED_RISK_GOALS`] risk-indicator goals hold the lowest concept.
    pub fn is_failure(&self) -> bool {
        let lowest_hits = RISK_INDICATOR_GOALS
            .iter()
            .filter(|goal| self.evaluations.get(**goal) == Some(&self.lowest_concept))
            .count();
        lowest_hits >= MIN_FAILED_RISK_GOALS
    }
}

/// Source of past enrollments, implemented by the gradebook.
#[async_trait]
pub trait EnrollmentHistory: Send + Sync {
    /// Enrollments of `student` in offerings of `current.topic` that come before `current`.
    async fn prior_enrollments(&self, student: &StudentId, current: &ClassKey)
    -> Vec<PriorEnrollment>;
}

/// `true` when the student failed any earlier offering of the same topic.
///
/// No prior offering, or no enrollment in one, is simply `false`.
pub async fn has_failed_prior_related_class<H>(
    history: &H,
    student: &StudentId,
    current: &ClassKey,
) -> bool
where
    H: EnrollmentHistory + ?Sized,
{
    let priors = history.prior_enrollments(student, current).await;
    let failed = priors.iter().find(|p| p.is_failure());

    if let Some(prior) = failed {
        debug!(student = %student, class = %current, prior = %prior.class, "Prior failure found");
    }

    failed.is_some()
}
