//! Per-class grading configuration.

use serde::{Deserialize, Serialize};

use crate::config::StatusThresholds;
use crate::error::GradingError;

/// Wire form of a [`GradingSpecification`], as ordered `(name, weight)` pairs:
///
/// ```json
/// {
///   "concept_weights": [["MA", 10], ["MPA", 7], ["MANA", 4]],
///   "goal_weights": [["Requirements", 1], ["Design", 1]]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingSpecificationInput {
    pub concept_weights: Vec<(String, f64)>,
    pub goal_weights: Vec<(String, f64)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<StatusThresholds>,
}

/// Concept values and goal importance for one class. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GradingSpecificationInput", into = "GradingSpecificationInput")]
pub struct GradingSpecification {
    concepts: Vec<(String, f64)>,
    goals: Vec<(String, f64)>,
    thresholds: Option<StatusThresholds>,
}

impl GradingSpecification {
    /// Validates and builds a specification.
    ///
    /// # Errors
    ///
    /// [`GradingError::Configuration`] when either map is empty, a name is blank
    /// or repeated, or a weight is not a positive finite number.
    pub fn new(
        concept_weights: Vec<(String, f64)>,
        goal_weights: Vec<(String, f64)>,
        thresholds: Option<StatusThresholds>,
    ) -> Result<Self, GradingError> {
        let concepts = validate_weights("concept", concept_weights)?;
        let goals = validate_weights("goal", goal_weights)?;

        if let Some(t) = thresholds {
            StatusThresholds::new(t.pass, t.safe)?;
        }

        Ok(Self {
            concepts,
            goals,
            thresholds,
        })
    }

    /// Numeric value of a concept symbol.
    pub fn concept_value(&self, symbol: &str) -> Result<f64, GradingError> {
        self.concepts
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, w)| *w)
            .ok_or_else(|| GradingError::UnknownConcept {
                concept: symbol.to_string(),
                known: self.concept_symbols().collect::<Vec<_>>().join(", "),
            })
    }

    /// Importance weight of a goal.
    pub fn goal_weight(&self, goal: &str) -> Result<f64, GradingError> {
        self.goals
            .iter()
            .find(|(g, _)| g == goal)
            .map(|(_, w)| *w)
            .ok_or_else(|| GradingError::UnknownGoal(goal.to_string()))
    }

    pub fn has_goal(&self, goal: &str) -> bool {
        self.goals.iter().any(|(g, _)| g == goal)
    }

    pub fn is_concept(&self, symbol: &str) -> bool {
        self.concepts.iter().any(|(s, _)| s == symbol)
    }

    pub fn concept_symbols(&self) -> impl Iterator<Item = &str> {
        self.concepts.iter().map(|(s, _)| s.as_str())
    }

    pub fn goal_names(&self) -> impl Iterator<Item = &str> {
        self.goals.iter().map(|(g, _)| g.as_str())
    }

    /// The concept with the smallest value.
    pub fn lowest_concept(&self) -> &str {
        self.concepts
            .iter()
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map_or("", |(symbol, _)| symbol.as_str())
    }

    /// The concept with the largest value.
    pub fn highest_concept(&self) -> &str {
        self.concepts
            .iter()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map_or("", |(symbol, _)| symbol.as_str())
    }

    /// Class-specific thresholds, if any were configured.
    pub fn thresholds(&self) -> Option<StatusThresholds> {
        self.thresholds
    }
}

impl TryFrom<GradingSpecificationInput> for GradingSpecification {
    type Error = GradingError;

    fn try_from(input: GradingSpecificationInput) -> Result<Self, Self::Error> {
        Self::new(input.concept_weights, input.goal_weights, input.thresholds)
    }
}

impl From<GradingSpecification> for GradingSpecificationInput {
    fn from(spec: GradingSpecification) -> Self {
        Self {
            concept_weights: spec.concepts,
            goal_weights: spec.goals,
            thresholds: spec.thresholds,
        }
    }
}

fn validate_weights(
    kind: &str,
    weights: Vec<(String, f64)>,
) -> Result<Vec<(String, f64)>, GradingError> {
    if weights.is_empty() {
        return Err(GradingError::Configuration(format!(
            "at least one {kind} weight is required"
        )));
    }

    let mut seen: Vec<(String, f64)> = Vec::with_capacity(weights.len());
    for (name, weight) in weights {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(GradingError::Configuration(format!("blank {kind} name")));
        }
        if !weight.is_finite() || weight <= 0.0 {
            return Err(GradingError::Configuration(format!(
                "{kind} '{name}' has non-positive weight {weight}"
            )));
        }
        if seen.iter().any(|(s, _)| *s == name) {
            return Err(GradingError::Configuration(format!(
                "duplicate {kind} '{name}'"
            )));
        }
        seen.push((name, weight));
    }

    Ok(seen)
}
