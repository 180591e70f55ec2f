use crate::analyzers::grading::GradingSpecification;
use crate::analyzers::types::ScoreBreakdown;
use crate::error::GradingError;
use std::collections::BTreeMap;

/// Computes the weighted score of one enrollment from its `goal -> concept` grades.
///
/// ```text
/// score = Σ goal_weight[g] * concept_value[grade[g]] / Σ goal_weight[g]
/// ```
///
/// Both sums run only over goals that have a recorded grade. A partially graded
/// enrollment is scored on what has been graded so far, so the score moves as
/// grading progresses instead of being dragged down by pending goals.
///
/// # Errors
///
/// - [`GradingError::EmptyEvaluationSet`] when nothing has been graded yet.
/// - [`GradingError::UnknownConcept`] / [`GradingError::UnknownGoal`] when a
///   recorded entry falls outside `spec`.
pub fn compute_score(
    spec: &GradingSpecification,
    evaluations: &BTreeMap<String, String>,
) -> Result<ScoreBreakdown, GradingError> {
    if evaluations.is_empty() {
        return Err(GradingError::EmptyEvaluationSet);
    }

    let mut weighted_total = 0.0;
    let mut weight_sum = 0.0;

    for (goal, concept) in evaluations {
        let weight = spec.goal_weight(goal)?;
        let value = spec.concept_value(concept)?;

        weighted_total += value * weight;
        weight_sum += weight;
    }

    Ok(ScoreBreakdown {
        score: weighted_total / weight_sum,
        graded_goals: evaluations.len(),
        total_goals: spec.goal_names().count(),
    })
}
