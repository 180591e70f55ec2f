//! In-memory student/class registry and per-class evaluation store.
//!
//! Every class owns its own [`tokio::sync::RwLock`] around its enrollments and
//! grades. Writes to one class are serialized; reads run concurrently and see a
//! whole batch or none of it. The registry-wide indexes are only held long
//! enough to clone an `Arc`, so different classes never block each other.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

use crate::analyzers::aggregate::compute_score;
use crate::analyzers::grading::GradingSpecification;
use crate::analyzers::history::{self, EnrollmentHistory, PriorEnrollment};
use crate::analyzers::status::classify;
use crate::analyzers::types::{EnrollmentStatus, ScoreBreakdown};
use crate::config::StatusThresholds;
use crate::error::GradingError;
use crate::model::{ClassId, ClassKey, Student, StudentId};

/// A student's membership in one class, with the grades recorded so far.
#[derive(Debug, Clone, Default)]
pub(crate) struct Enrollment {
    /// `false` once the student was removed from the registry. The grades stay
    /// so the student's history is still visible to later offerings.
    pub(crate) active: bool,
    pub(crate) evaluations: BTreeMap<String, String>,
    /// Grades of earlier enrollments in this class that ended with the
    /// student's removal. Only history lookups read them.
    pub(crate) withdrawn: Vec<BTreeMap<String, String>>,
}

impl Enrollment {
    /// Every grade set recorded for this student in this class, current one last.
    fn grade_sets(&self) -> impl Iterator<Item = &BTreeMap<String, String>> {
        self.withdrawn
            .iter()
            .chain(std::iter::once(&self.evaluations))
            .filter(|e| !e.is_empty())
    }
}

/// Enrollments and grades of one class. Only reachable through the class lock.
#[derive(Debug, Default)]
pub struct ClassBook {
    enrollments: BTreeMap<StudentId, Enrollment>,
}

impl ClassBook {
    pub fn is_enrolled(&self, student: &StudentId) -> bool {
        self.enrollments.get(student).is_some_and(|e| e.active)
    }

    /// Grades of an active enrollment.
    pub fn evaluations(&self, student: &StudentId) -> Option<&BTreeMap<String, String>> {
        self.enrollments
            .get(student)
            .filter(|e| e.active)
            .map(|e| &e.evaluations)
    }

    pub fn active_students(&self) -> impl Iterator<Item = &StudentId> {
        self.enrollments
            .iter()
            .filter(|(_, e)| e.active)
            .map(|(id, _)| id)
    }

    /// Last write wins. Returns `true` if the stored grade changed.
    pub(crate) fn record(&mut self, student: &StudentId, goal: &str, concept: &str) -> bool {
        let Some(enrollment) = self.enrollments.get_mut(student).filter(|e| e.active) else {
            return false;
        };
        match enrollment.evaluations.get(goal) {
            Some(existing) if existing == concept => false,
            _ => {
                enrollment
                    .evaluations
                    .insert(goal.to_string(), concept.to_string());
                true
            }
        }
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (&StudentId, &Enrollment)> {
        self.enrollments.iter()
    }
}

/// A class offering with its grading specification and evaluation store.
#[derive(Debug)]
pub struct ClassSection {
    pub id: ClassId,
    pub key: ClassKey,
    pub grading: GradingSpecification,
    book: RwLock<ClassBook>,
}

impl ClassSection {
    pub async fn read_book(&self) -> RwLockReadGuard<'_, ClassBook> {
        self.book.read().await
    }

    /// Exclusive per-class write access. Hold it only for in-memory writes.
    pub(crate) async fn write_book(&self) -> RwLockWriteGuard<'_, ClassBook> {
        self.book.write().await
    }
}

#[derive(Default)]
struct ClassIndex {
    by_id: HashMap<ClassId, Arc<ClassSection>>,
    by_key: HashMap<ClassKey, ClassId>,
}

/// Registry of students and classes plus their evaluation stores.
pub struct Gradebook {
    thresholds: StatusThresholds,
    next_class_id: AtomicU64,
    classes: RwLock<ClassIndex>,
    students: RwLock<HashMap<StudentId, Student>>,
}

impl Default for Gradebook {
    fn default() -> Self {
        Self::new(StatusThresholds::DEFAULT)
    }
}

impl Gradebook {
    /// Creates an empty gradebook using `thresholds` for classes without their own.
    pub fn new(thresholds: StatusThresholds) -> Self {
        Self {
            thresholds,
            next_class_id: AtomicU64::new(1),
            classes: RwLock::new(ClassIndex::default()),
            students: RwLock::new(HashMap::new()),
        }
    }

    // ------------------------------------------------------------------
    // Classes
    // ------------------------------------------------------------------

    /// Creates a class. A duplicate `(topic, year, semester)` fails without changes.
    #[tracing::instrument(skip(self, grading))]
    pub async fn create_class(
        &self,
        key: ClassKey,
        grading: GradingSpecification,
    ) -> Result<ClassId, GradingError> {
        let mut index = self.classes.write().await;
        if index.by_key.contains_key(&key) {
            warn!("Class already exists");
            return Err(GradingError::DuplicateClass(key.to_string()));
        }

        let id = ClassId(self.next_class_id.fetch_add(1, Ordering::Relaxed));
        let section = Arc::new(ClassSection {
            id,
            key: key.clone(),
            grading,
            book: RwLock::new(ClassBook::default()),
        });
        index.by_key.insert(key, id);
        index.by_id.insert(id, section);

        info!(class_id = %id, "Class created");
        Ok(id)
    }

    pub async fn find_class(&self, key: &ClassKey) -> Option<ClassId> {
        self.classes.read().await.by_key.get(key).copied()
    }

    pub async fn class(&self, id: ClassId) -> Result<Arc<ClassSection>, GradingError> {
        self.classes
            .read()
            .await
            .by_id
            .get(&id)
            .cloned()
            .ok_or_else(|| GradingError::UnknownClass(id.to_string()))
    }

    /// All classes ordered by topic, then year and semester.
    pub async fn list_classes(&self) -> Vec<Arc<ClassSection>> {
        let mut classes: Vec<_> = self.classes.read().await.by_id.values().cloned().collect();
        classes.sort_by(|a, b| a.key.cmp(&b.key));
        classes
    }

    pub async fn remove_class(&self, id: ClassId) -> Result<(), GradingError> {
        let mut index = self.classes.write().await;
        let section = index
            .by_id
            .remove(&id)
            .ok_or_else(|| GradingError::UnknownClass(id.to_string()))?;
        index.by_key.remove(&section.key);

        info!(class_id = %id, class = %section.key, "Class removed");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Students
    // ------------------------------------------------------------------

    pub async fn register_student(&self, student: Student) -> Result<StudentId, GradingError> {
        let mut students = self.students.write().await;
        if students.contains_key(&student.id) {
            return Err(GradingError::DuplicateStudent(student.id.to_string()));
        }

        let id = student.id.clone();
        debug!(student = %id, "Student registered");
        students.insert(id.clone(), student);
        Ok(id)
    }

    pub async fn find_student(&self, id: &StudentId) -> Option<Student> {
        self.students.read().await.get(id).cloned()
    }

    /// All registered students ordered by national ID.
    pub async fn list_students(&self) -> Vec<Student> {
        let mut students: Vec<_> = self.students.read().await.values().cloned().collect();
        students.sort_by(|a, b| a.id.cmp(&b.id));
        students
    }

    pub async fn update_student(
        &self,
        id: &StudentId,
        name: &str,
        email: &str,
    ) -> Result<Student, GradingError> {
        let updated = Student::new(id.as_str(), name, email)?;
        let mut students = self.students.write().await;
        let slot = students
            .get_mut(id)
            .ok_or_else(|| GradingError::UnknownStudent(id.to_string()))?;
        *slot = updated.clone();
        Ok(updated)
    }

    /// Removes a student and withdraws their enrollments.
    ///
    /// Recorded grades are kept so that a returning student's history still
    /// counts in later offerings.
    #[tracing::instrument(skip(self))]
    pub async fn remove_student(&self, id: &StudentId) -> Result<(), GradingError> {
        if self.students.write().await.remove(id).is_none() {
            return Err(GradingError::UnknownStudent(id.to_string()));
        }

        for section in self.list_classes().await {
            let mut book = section.write_book().await;
            if let Some(enrollment) = book.enrollments.get_mut(id) {
                enrollment.active = false;
            }
        }

        info!("Student removed");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Enrollments and evaluations
    // ------------------------------------------------------------------

    /// Enrolls a registered student. Enrolling twice is a no-op.
    ///
    /// Re-enrolling after a removal starts from an empty grade set; the old
    /// grades stay on record for history only.
    pub async fn enroll(&self, class: ClassId, student: &StudentId) -> Result<(), GradingError> {
        if self.find_student(student).await.is_none() {
            return Err(GradingError::UnknownStudent(student.to_string()));
        }

        let section = self.class(class).await?;
        let mut book = section.write_book().await;
        let enrollment = book.enrollments.entry(student.clone()).or_default();
        if !enrollment.active {
            let previous = std::mem::take(&mut enrollment.evaluations);
            if !previous.is_empty() {
                enrollment.withdrawn.push(previous);
            }
            enrollment.active = true;
            debug!(class = %section.key, student = %student, "Student enrolled");
        }
        Ok(())
    }

    /// Validates and stores one grade. Returns `true` if the stored grade changed.
    ///
    /// # Errors
    ///
    /// [`GradingError::UnknownGoal`], [`GradingError::UnknownConcept`] or
    /// [`GradingError::NotEnrolled`]; nothing is stored in those cases.
    #[tracing::instrument(skip(self))]
    pub async fn record_evaluation(
        &self,
        class: ClassId,
        student: &StudentId,
        goal: &str,
        concept: &str,
    ) -> Result<bool, GradingError> {
        let section = self.class(class).await?;
        section.grading.goal_weight(goal)?;
        section.grading.concept_value(concept)?;

        let mut book = section.write_book().await;
        if !book.is_enrolled(student) {
            return Err(GradingError::NotEnrolled {
                student: student.to_string(),
                class: section.key.to_string(),
            });
        }

        let changed = book.record(student, goal, concept);
        debug!(changed, "Evaluation recorded");
        Ok(changed)
    }

    pub async fn evaluations(
        &self,
        class: ClassId,
        student: &StudentId,
    ) -> Result<BTreeMap<String, String>, GradingError> {
        let section = self.class(class).await?;
        let book = section.read_book().await;
        book.evaluations(student)
            .cloned()
            .ok_or_else(|| GradingError::NotEnrolled {
                student: student.to_string(),
                class: section.key.to_string(),
            })
    }

    // ------------------------------------------------------------------
    // Derived status
    // ------------------------------------------------------------------

    /// Weighted score of one enrollment.
    ///
    /// # Errors
    ///
    /// [`GradingError::EmptyEvaluationSet`] while nothing is graded.
    pub async fn compute_score(
        &self,
        class: ClassId,
        student: &StudentId,
    ) -> Result<ScoreBreakdown, GradingError> {
        let section = self.class(class).await?;
        let evaluations = self.evaluations(class, student).await?;
        compute_score(&section.grading, &evaluations)
    }

    pub async fn has_failed_prior_related_class(
        &self,
        student: &StudentId,
        class: ClassId,
    ) -> Result<bool, GradingError> {
        let section = self.class(class).await?;
        Ok(history::has_failed_prior_related_class(self, student, &section.key).await)
    }

    /// Thresholds in force for `section`.
    pub fn thresholds_for(&self, section: &ClassSection) -> StatusThresholds {
        section.grading.thresholds().unwrap_or(self.thresholds)
    }

    /// Score and color of one enrollment, recomputed from the current grades.
    pub async fn enrollment_status(
        &self,
        class: ClassId,
        student: &StudentId,
    ) -> Result<EnrollmentStatus, GradingError> {
        let section = self.class(class).await?;
        let evaluations = self.evaluations(class, student).await?;
        self.status_of(&section, student, &evaluations).await
    }

    /// Statuses of every active enrollment in a class, ordered by national ID.
    #[tracing::instrument(skip(self))]
    pub async fn class_statuses(
        &self,
        class: ClassId,
    ) -> Result<Vec<EnrollmentStatus>, GradingError> {
        let section = self.class(class).await?;

        // Snapshot under the read lock, then release it before the history lookups.
        let snapshot: Vec<(StudentId, BTreeMap<String, String>)> = {
            let book = section.read_book().await;
            book.active_students()
                .filter_map(|id| book.evaluations(id).map(|e| (id.clone(), e.clone())))
                .collect()
        };

        let mut statuses = Vec::with_capacity(snapshot.len());
        for (student, evaluations) in snapshot {
            statuses.push(self.status_of(&section, &student, &evaluations).await?);
        }

        debug!(count = statuses.len(), "Class statuses computed");
        Ok(statuses)
    }

    async fn status_of(
        &self,
        section: &ClassSection,
        student: &StudentId,
        evaluations: &BTreeMap<String, String>,
    ) -> Result<EnrollmentStatus, GradingError> {
        let student_name = self
            .find_student(student)
            .await
            .map(|s| s.name)
            .unwrap_or_default();
        let failed_prior =
            history::has_failed_prior_related_class(self, student, &section.key).await;
        let total_goals = section.grading.goal_names().count();

        let (score, graded_goals, status) = match compute_score(&section.grading, evaluations) {
            Ok(breakdown) => (
                Some(breakdown.score),
                breakdown.graded_goals,
                Some(classify(
                    breakdown.score,
                    failed_prior,
                    &self.thresholds_for(section),
                )),
            ),
            Err(GradingError::EmptyEvaluationSet) => (None, 0, None),
            Err(e) => return Err(e),
        };

        Ok(EnrollmentStatus {
            class: section.key.clone(),
            student_id: student.clone(),
            student_name,
            score,
            graded_goals,
            total_goals,
            failed_prior,
            status,
        })
    }

    /// Reinstates an enrollment exactly as exported, bypassing registration checks.
    pub(crate) async fn restore_enrollment(
        &self,
        class: ClassId,
        student: StudentId,
        active: bool,
        evaluations: BTreeMap<String, String>,
        withdrawn: Vec<BTreeMap<String, String>>,
    ) -> Result<(), GradingError> {
        let section = self.class(class).await?;
        for (goal, concept) in withdrawn.iter().chain(std::iter::once(&evaluations)).flatten() {
            section.grading.goal_weight(goal)?;
            section.grading.concept_value(concept)?;
        }

        section.write_book().await.enrollments.insert(
            student,
            Enrollment {
                active,
                evaluations,
                withdrawn,
            },
        );
        Ok(())
    }
}

#[async_trait]
impl EnrollmentHistory for Gradebook {
    async fn prior_enrollments(
        &self,
        student: &StudentId,
        current: &ClassKey,
    ) -> Vec<PriorEnrollment> {
        let mut priors = Vec::new();
        for section in self.list_classes().await {
            if !current.is_prior_offering(&section.key) {
                continue;
            }
            let book = section.read_book().await;
            if let Some(enrollment) = book.enrollments.get(student) {
                priors.extend(enrollment.grade_sets().map(|evaluations| PriorEnrollment {
                    class: section.key.clone(),
                    lowest_concept: section.grading.lowest_concept().to_string(),
                    evaluations: evaluations.clone(),
                }));
            }
        }
        priors
    }
}
