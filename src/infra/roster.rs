use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use crate::analyzers::grading::GradingSpecification;
use crate::config::StatusThresholds;
use crate::gradebook::Gradebook;
use crate::model::{ClassKey, Student, StudentId};

/// JSON snapshot of a gradebook, used by the CLI to seed and save state.
///
/// ```json
/// {
///   "students": [{ "id": "12345678900", "name": "Ana", "email": "ana@example.com" }],
///   "classes": [{
///     "topic": "ESS", "year": 2025, "semester": 1,
///     "grading": {
///       "concept_weights": [["MA", 10], ["MPA", 7], ["MANA", 4]],
///       "goal_weights": [["Requirements", 1], ["Design", 1]]
///     },
///     "enrollments": [{ "student_id": "12345678900", "evaluations": { "Design": "MA" } }]
///   }]
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RosterFile {
    #[serde(default)]
    pub students: Vec<Student>,
    #[serde(default)]
    pub classes: Vec<RosterClass>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterClass {
    #[serde(flatten)]
    pub key: ClassKey,
    pub grading: GradingSpecification,
    #[serde(default)]
    pub enrollments: Vec<RosterEnrollment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterEnrollment {
    pub student_id: StudentId,
    /// `false` for students that were removed but whose grades are kept as history.
    #[serde(default = "active_by_default")]
    pub active: bool,
    #[serde(default)]
    pub evaluations: BTreeMap<String, String>,
    /// Grades from enrollments that ended with the student's removal.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub withdrawn: Vec<BTreeMap<String, String>>,
}

fn active_by_default() -> bool {
    true
}

impl RosterFile {
    /// Loads a roster from a JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read roster {}", path.display()))?;
        let roster: RosterFile = serde_json::from_str(&content)
            .with_context(|| format!("invalid roster {}", path.display()))?;
        debug!(
            path = %path.display(),
            students = roster.students.len(),
            classes = roster.classes.len(),
            "Roster loaded"
        );
        Ok(roster)
    }

    /// Writes the roster as pretty-printed JSON, replacing `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write roster {}", path.display()))?;
        info!(path = %path.display(), "Roster saved");
        Ok(())
    }

    /// Builds a gradebook holding everything in this roster.
    pub async fn into_gradebook(self, thresholds: StatusThresholds) -> Result<Gradebook> {
        let gradebook = Gradebook::new(thresholds);

        for student in self.students {
            gradebook.register_student(student).await?;
        }

        for class in self.classes {
            let label = class.key.to_string();
            let id = gradebook
                .create_class(class.key, class.grading)
                .await
                .with_context(|| format!("roster class {label}"))?;

            for enrollment in class.enrollments {
                if enrollment.active && gradebook.find_student(&enrollment.student_id).await.is_none()
                {
                    bail!(
                        "class {label} enrolls unregistered student {}",
                        enrollment.student_id
                    );
                }
                gradebook
                    .restore_enrollment(
                        id,
                        enrollment.student_id,
                        enrollment.active,
                        enrollment.evaluations,
                        enrollment.withdrawn,
                    )
                    .await
                    .with_context(|| format!("roster class {label}"))?;
            }
        }

        Ok(gradebook)
    }

    /// Captures the current state of `gradebook`.
    pub async fn from_gradebook(gradebook: &Gradebook) -> Self {
        let mut classes = Vec::new();
        for section in gradebook.list_classes().await {
            let book = section.read_book().await;
            let enrollments = book
                .entries()
                .map(|(student_id, enrollment)| RosterEnrollment {
                    student_id: student_id.clone(),
                    active: enrollment.active,
                    evaluations: enrollment.evaluations.clone(),
                    withdrawn: enrollment.withdrawn.clone(),
                })
                .collect();
            classes.push(RosterClass {
                key: section.key.clone(),
                grading: section.grading.clone(),
                enrollments,
            });
        }

        RosterFile {
            students: gradebook.list_students().await,
            classes,
        }
    }
}
