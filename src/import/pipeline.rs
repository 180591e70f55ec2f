use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use super::report::{ImportReport, RowFailure, RowFailureReason, RowOutcome};
use crate::analyzers::grading::GradingSpecification;
use crate::error::ImportError;
use crate::gradebook::{ClassSection, Gradebook};
use crate::model::{ClassId, StudentId};
use crate::sheet::{SheetReader, SheetRow};

/// Where an [`ImportPipeline`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportState {
    AwaitingFile,
    ColumnsDetected,
    MappingConfirmed,
    Applying,
    Completed,
    Failed,
}

/// What a sheet column feeds into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnBinding {
    /// The column holds the student's national ID.
    StudentId,
    /// The column holds concept symbols for this goal.
    Goal(String),
    Ignore,
}

/// Caller-supplied binding for every detected column, keyed by header name.
#[derive(Debug, Clone, Default)]
pub struct ColumnMapping {
    bindings: BTreeMap<String, ColumnBinding>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds every column whose header is exactly a goal name of `grading`.
    pub fn matching_goals(columns: &[String], grading: &GradingSpecification) -> Self {
        let bindings = columns
            .iter()
            .filter(|c| grading.has_goal(c))
            .map(|c| (c.clone(), ColumnBinding::Goal(c.clone())))
            .collect();
        Self { bindings }
    }

    pub fn id_column(self, column: &str) -> Self {
        self.bind(column, ColumnBinding::StudentId)
    }

    pub fn goal(self, column: &str, goal: &str) -> Self {
        self.bind(column, ColumnBinding::Goal(goal.to_string()))
    }

    pub fn ignore(self, column: &str) -> Self {
        self.bind(column, ColumnBinding::Ignore)
    }

    pub fn bind(mut self, column: &str, binding: ColumnBinding) -> Self {
        self.bindings.insert(column.to_string(), binding);
        self
    }

    pub fn get(&self, column: &str) -> Option<&ColumnBinding> {
        self.bindings.get(column)
    }
}

/// Cancels an import from another task. Effective until the batch starts writing.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A row whose student and symbols were checked before taking the class lock.
struct StagedRow {
    line: u64,
    student: StudentId,
    writes: Vec<(String, String)>,
}

/// Imports a grade sheet into one class.
///
/// ```text
/// AwaitingFile -> ColumnsDetected -> MappingConfirmed -> Applying -> Completed | Failed
/// ```
///
/// Sheet parsing, student lookups and symbol validation all happen before the
/// class write lock is taken. The staged writes are then applied in one pass
/// under the lock, so readers observe the whole batch or none of it.
pub struct ImportPipeline {
    gradebook: Arc<Gradebook>,
    class: Arc<ClassSection>,
    state: ImportState,
    columns: Vec<String>,
    rows: Vec<SheetRow>,
    id_column: usize,
    goal_columns: Vec<(usize, String)>,
    cancel: CancelHandle,
    started_at: DateTime<Utc>,
}

impl ImportPipeline {
    pub async fn new(gradebook: Arc<Gradebook>, class: ClassId) -> Result<Self, ImportError> {
        let class = gradebook.class(class).await?;
        Ok(Self {
            gradebook,
            class,
            state: ImportState::AwaitingFile,
            columns: Vec::new(),
            rows: Vec::new(),
            id_column: 0,
            goal_columns: Vec::new(),
            cancel: CancelHandle::default(),
            started_at: Utc::now(),
        })
    }

    pub fn state(&self) -> ImportState {
        self.state
    }

    /// Columns detected by the last successful [`load`](Self::load).
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn class(&self) -> &ClassSection {
        &self.class
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Reads the header and rows of a sheet: `AwaitingFile -> ColumnsDetected`.
    ///
    /// A new sheet may be loaded again until the mapping is confirmed.
    ///
    /// # Errors
    ///
    /// [`ImportError::EmptyFile`] leaves the pipeline in its current state so
    /// the caller can supply another file.
    pub fn load(&mut self, reader: &dyn SheetReader) -> Result<&[String], ImportError> {
        self.expect_state(
            "load a sheet",
            &[ImportState::AwaitingFile, ImportState::ColumnsDetected],
        )?;
        self.check_cancelled()?;

        let columns = reader.parse_header()?;
        let mut seen = HashSet::new();
        if let Some(dup) = columns.iter().find(|c| !c.is_empty() && !seen.insert(*c)) {
            return Err(ImportError::Malformed(format!("duplicate column '{dup}'")));
        }
        let rows = reader.parse_rows()?;

        info!(
            class = %self.class.key,
            columns = columns.len(),
            rows = rows.len(),
            "Sheet columns detected"
        );

        self.columns = columns;
        self.rows = rows;
        self.goal_columns.clear();
        self.state = ImportState::ColumnsDetected;
        Ok(&self.columns)
    }

    /// Binds every column: `ColumnsDetected -> MappingConfirmed`.
    ///
    /// # Errors
    ///
    /// [`ImportError::UnmappedColumn`] for a column with no binding, plus
    /// [`ImportError::UnknownColumn`], [`ImportError::MissingIdColumn`],
    /// [`ImportError::DuplicateIdColumn`] and [`ImportError::UnknownGoal`].
    /// The pipeline stays put on error, ready for a corrected mapping.
    pub fn confirm_mapping(&mut self, mapping: &ColumnMapping) -> Result<(), ImportError> {
        self.expect_state(
            "confirm the column mapping",
            &[ImportState::ColumnsDetected, ImportState::MappingConfirmed],
        )?;
        self.check_cancelled()?;

        if let Some(unknown) = mapping
            .bindings
            .keys()
            .find(|k| !self.columns.contains(*k))
        {
            return Err(ImportError::UnknownColumn(unknown.clone()));
        }

        let mut id_column = None;
        let mut goal_columns: Vec<(usize, String)> = Vec::new();

        for (index, column) in self.columns.iter().enumerate() {
            match mapping.get(column) {
                Some(ColumnBinding::StudentId) => {
                    if id_column.replace(index).is_some() {
                        return Err(ImportError::DuplicateIdColumn);
                    }
                }
                Some(ColumnBinding::Goal(goal)) => {
                    if !self.class.grading.has_goal(goal) {
                        return Err(ImportError::UnknownGoal {
                            column: column.clone(),
                            goal: goal.clone(),
                        });
                    }
                    if goal_columns.iter().any(|(_, g)| g == goal) {
                        return Err(ImportError::Malformed(format!(
                            "goal '{goal}' is bound to more than one column"
                        )));
                    }
                    goal_columns.push((index, goal.clone()));
                }
                Some(ColumnBinding::Ignore) => {}
                // A blank header cell carries no data worth mapping.
                None if column.is_empty() => {}
                None => return Err(ImportError::UnmappedColumn(column.clone())),
            }
        }

        self.id_column = id_column.ok_or(ImportError::MissingIdColumn)?;
        debug!(goals = goal_columns.len(), "Column mapping confirmed");
        self.goal_columns = goal_columns;
        self.state = ImportState::MappingConfirmed;
        Ok(())
    }

    /// Stages and applies every row: `MappingConfirmed -> Applying -> Completed`.
    ///
    /// Row-level problems are reported in the returned [`ImportReport`] and do
    /// not stop sibling rows. Cancellation is honoured until the class lock is
    /// held; from then on the batch runs to completion.
    ///
    /// # Errors
    ///
    /// [`ImportError::Cancelled`] (state becomes `Failed`, nothing written).
    #[tracing::instrument(skip(self), fields(class = %self.class.key))]
    pub async fn apply(&mut self) -> Result<ImportReport, ImportError> {
        self.expect_state("apply the import", &[ImportState::MappingConfirmed])?;
        self.check_cancelled()?;
        self.state = ImportState::Applying;
        self.started_at = Utc::now();

        let mut outcomes = Vec::with_capacity(self.rows.len());
        let mut staged = Vec::new();
        let mut seen = HashMap::new();
        for row in &self.rows {
            let staged_row = match self.stage_row(row).await {
                Ok(row) => row,
                Err(failure) => {
                    outcomes.push(RowOutcome::Failed(failure));
                    continue;
                }
            };
            match check_repeat(&mut seen, &staged_row) {
                Ok(()) => staged.push(staged_row),
                Err(failure) => outcomes.push(RowOutcome::Failed(failure)),
            }
        }

        // Last point where cancelling is still a clean no-op.
        self.check_cancelled()?;
        let class = Arc::clone(&self.class);
        let mut book = class.write_book().await;
        self.check_cancelled()?;

        for row in staged {
            if !book.is_enrolled(&row.student) {
                outcomes.push(RowOutcome::Failed(RowFailure {
                    line: row.line,
                    student_id: Some(row.student.to_string()),
                    reason: RowFailureReason::NotEnrolled {
                        student: row.student.to_string(),
                    },
                }));
                continue;
            }
            if row.writes.is_empty() {
                outcomes.push(RowOutcome::SkippedEmpty {
                    line: row.line,
                    student_id: row.student,
                });
                continue;
            }

            let mut written = 0;
            for (goal, concept) in &row.writes {
                if book.record(&row.student, goal, concept) {
                    written += 1;
                }
            }

            outcomes.push(if written > 0 {
                RowOutcome::Applied {
                    line: row.line,
                    student_id: row.student,
                    written,
                }
            } else {
                RowOutcome::SkippedDuplicate {
                    line: row.line,
                    student_id: row.student,
                }
            });
        }
        drop(book);

        self.state = ImportState::Completed;
        let report =
            ImportReport::from_outcomes(self.class.key.clone(), self.started_at, outcomes);

        info!(
            rows = report.total_rows,
            applied = report.applied,
            duplicates = report.duplicates,
            empty = report.empty,
            failed = report.failed,
            written = report.evaluations_written,
            "Import batch applied"
        );
        for failure in report.failures() {
            warn!(line = failure.line, reason = %failure.reason, "Import row failed");
        }

        Ok(report)
    }

    async fn stage_row(&self, row: &SheetRow) -> Result<StagedRow, RowFailure> {
        let raw_id = row.cell(self.id_column);
        let fail = |student_id: Option<String>, reason| RowFailure {
            line: row.line,
            student_id,
            reason,
        };

        if raw_id.is_empty() {
            return Err(fail(None, RowFailureReason::MissingStudentId));
        }
        let student = StudentId::parse(raw_id).map_err(|_| {
            fail(
                Some(raw_id.to_string()),
                RowFailureReason::InvalidStudentId {
                    value: raw_id.to_string(),
                },
            )
        })?;

        if self.gradebook.find_student(&student).await.is_none() {
            return Err(fail(
                Some(student.to_string()),
                RowFailureReason::UnknownStudent {
                    student: student.to_string(),
                },
            ));
        }

        let mut writes = Vec::with_capacity(self.goal_columns.len());
        for (index, goal) in &self.goal_columns {
            let value = row.cell(*index);
            if value.is_empty() {
                continue;
            }
            if !self.class.grading.is_concept(value) {
                return Err(fail(
                    Some(student.to_string()),
                    RowFailureReason::UnknownConcept {
                        column: self.columns[*index].clone(),
                        goal: goal.clone(),
                        value: value.to_string(),
                    },
                ));
            }
            writes.push((goal.clone(), value.to_string()));
        }

        Ok(StagedRow {
            line: row.line,
            student,
            writes,
        })
    }

    fn expect_state(
        &self,
        action: &'static str,
        allowed: &[ImportState],
    ) -> Result<(), ImportError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(ImportError::InvalidState {
                action,
                state: self.state,
            })
        }
    }

    fn check_cancelled(&mut self) -> Result<(), ImportError> {
        if self.cancel.is_cancelled() {
            if self.state != ImportState::Failed {
                info!(class = %self.class.key, "Import cancelled");
            }
            self.state = ImportState::Failed;
            return Err(ImportError::Cancelled);
        }
        Ok(())
    }
}

/// Accepts a repeated row for a student only if it agrees with every grade the
/// student's earlier rows in this sheet gave the same goals.
fn check_repeat(
    seen: &mut HashMap<StudentId, (u64, BTreeMap<String, String>)>,
    row: &StagedRow,
) -> Result<(), RowFailure> {
    let (first_line, grades) = seen
        .entry(row.student.clone())
        .or_insert_with(|| (row.line, BTreeMap::new()));

    let conflict = row
        .writes
        .iter()
        .any(|(goal, concept)| grades.get(goal).is_some_and(|c| c != concept));
    if conflict {
        return Err(RowFailure {
            line: row.line,
            student_id: Some(row.student.to_string()),
            reason: RowFailureReason::DuplicateRow {
                first_line: *first_line,
            },
        });
    }

    for (goal, concept) in &row.writes {
        grades.insert(goal.clone(), concept.clone());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::grading::tests::standard_spec;
    use crate::model::{ClassKey, Student};
    use crate::sheet::DelimitedSheet;
    use bytes::Bytes;
    use std::time::Duration;

    const SHEET: &str = "\
cpf,Nome,Requirements,Design,Tests
111.111.111-11,Ana,MA,MA,MPA
222.222.222-22,Bruno,MANA,B+,MA
333.333.333-33,Carla,MPA,,MA
";

    async fn setup() -> (Arc<Gradebook>, ClassId) {
        let book = Arc::new(Gradebook::default());
        let class = book
            .create_class(ClassKey::new("ESS", 2025, 1), standard_spec())
            .await
            .unwrap();
        for (id, name) in [("11111111111", "Ana"), ("22222222222", "Bruno"), ("33333333333", "Carla")] {
            let student = book
                .register_student(Student::new(id, name, "x@example.com").unwrap())
                .await
                .unwrap();
            book.enroll(class, &student).await.unwrap();
        }
        (book, class)
    }

    fn sheet(text: &str) -> DelimitedSheet {
        DelimitedSheet::new(Bytes::from(text.to_string()), b',')
    }

    fn mapping() -> ColumnMapping {
        ColumnMapping::new()
            .id_column("cpf")
            .ignore("Nome")
            .goal("Requirements", "Requirements")
            .goal("Design", "Design")
            .goal("Tests", "Tests")
    }

    async fn ready(book: &Arc<Gradebook>, class: ClassId, text: &str) -> ImportPipeline {
        let mut pipeline = ImportPipeline::new(book.clone(), class).await.unwrap();
        pipeline.load(&sheet(text)).unwrap();
        pipeline.confirm_mapping(&mapping()).unwrap();
        pipeline
    }

    fn id(raw: &str) -> StudentId {
        StudentId::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_empty_file_keeps_awaiting_file() {
        let (book, class) = setup().await;
        let mut pipeline = ImportPipeline::new(book, class).await.unwrap();

        let err = pipeline.load(&sheet("")).unwrap_err();
        assert!(matches!(err, ImportError::EmptyFile));
        assert_eq!(pipeline.state(), ImportState::AwaitingFile);

        let columns = pipeline.load(&sheet(SHEET)).unwrap();
        assert_eq!(columns, ["cpf", "Nome", "Requirements", "Design", "Tests"]);
        assert_eq!(pipeline.state(), ImportState::ColumnsDetected);
    }

    #[tokio::test]
    async fn test_unmapped_column_blocks_until_ignored() {
        let (book, class) = setup().await;
        let mut pipeline = ImportPipeline::new(book, class).await.unwrap();
        pipeline.load(&sheet(SHEET)).unwrap();

        let partial = ColumnMapping::new()
            .id_column("cpf")
            .goal("Requirements", "Requirements")
            .goal("Design", "Design")
            .goal("Tests", "Tests");
        let err = pipeline.confirm_mapping(&partial).unwrap_err();
        assert!(matches!(err, ImportError::UnmappedColumn(ref c) if c == "Nome"));
        assert_eq!(pipeline.state(), ImportState::ColumnsDetected);

        pipeline.confirm_mapping(&partial.ignore("Nome")).unwrap();
        assert_eq!(pipeline.state(), ImportState::MappingConfirmed);
    }

    #[tokio::test]
    async fn test_mapping_validation() {
        let (book, class) = setup().await;
        let mut pipeline = ImportPipeline::new(book, class).await.unwrap();
        pipeline.load(&sheet(SHEET)).unwrap();

        let no_id = ColumnMapping::new()
            .ignore("cpf")
            .ignore("Nome")
            .ignore("Requirements")
            .ignore("Design")
            .ignore("Tests");
        assert!(matches!(
            pipeline.confirm_mapping(&no_id),
            Err(ImportError::MissingIdColumn)
        ));

        let bad_goal = mapping().goal("Tests", "Cooking");
        assert!(matches!(
            pipeline.confirm_mapping(&bad_goal),
            Err(ImportError::UnknownGoal { .. })
        ));

        let ghost = mapping().ignore("Email");
        assert!(matches!(
            pipeline.confirm_mapping(&ghost),
            Err(ImportError::UnknownColumn(_))
        ));
    }

    #[tokio::test]
    async fn test_apply_before_mapping_is_invalid() {
        let (book, class) = setup().await;
        let mut pipeline = ImportPipeline::new(book, class).await.unwrap();
        let err = pipeline.apply().await.unwrap_err();
        assert!(matches!(
            err,
            ImportError::InvalidState {
                state: ImportState::AwaitingFile,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_unknown_symbol_fails_only_its_row() {
        let (book, class) = setup().await;
        let mut pipeline = ready(&book, class, SHEET).await;
        let report = pipeline.apply().await.unwrap();

        assert_eq!(pipeline.state(), ImportState::Completed);
        assert_eq!(report.total_rows, 3);
        assert_eq!(report.applied, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.evaluations_written, 5);

        let failure = report.failures().next().unwrap();
        assert_eq!(failure.line, 3);
        assert!(matches!(
            &failure.reason,
            RowFailureReason::UnknownConcept { value, .. } if value == "B+"
        ));

        // Nothing from Bruno's row was written, not even the valid cells.
        assert!(book.evaluations(class, &id("22222222222")).await.unwrap().is_empty());

        let carla = book.evaluations(class, &id("33333333333")).await.unwrap();
        assert_eq!(carla.len(), 2);
        assert!(!carla.contains_key("Design"));
    }

    #[tokio::test]
    async fn test_second_import_is_all_duplicates() {
        let (book, class) = setup().await;
        let clean = "cpf,Nome,Requirements,Design,Tests\n11111111111,Ana,MA,MA,MPA\n33333333333,Carla,MPA,,MA\n";

        let first = ready(&book, class, clean).await.apply().await.unwrap();
        assert_eq!(first.applied, 2);
        let before = book.evaluations(class, &id("11111111111")).await.unwrap();

        let second = ready(&book, class, clean).await.apply().await.unwrap();
        assert_eq!(second.applied, 0);
        assert_eq!(second.duplicates, 2);
        assert_eq!(second.failed, 0);
        assert_eq!(book.evaluations(class, &id("11111111111")).await.unwrap(), before);
    }

    async fn design_only(book: &Arc<Gradebook>, class: ClassId, text: &str) -> ImportReport {
        let mut pipeline = ImportPipeline::new(book.clone(), class).await.unwrap();
        pipeline.load(&sheet(text)).unwrap();
        pipeline
            .confirm_mapping(&ColumnMapping::new().id_column("cpf").goal("Design", "Design"))
            .unwrap();
        pipeline.apply().await.unwrap()
    }

    #[tokio::test]
    async fn test_conflicting_repeat_row_fails_and_reimport_is_stable() {
        let (book, class) = setup().await;
        let text = "cpf,Design\n111.111.111-11,MA\n111.111.111-11,MANA\n";

        let first = design_only(&book, class, text).await;
        assert_eq!((first.applied, first.failed), (1, 1));
        let failure = first.failures().next().unwrap();
        assert_eq!(failure.line, 3);
        assert_eq!(failure.reason, RowFailureReason::DuplicateRow { first_line: 2 });
        assert_eq!(
            book.evaluations(class, &id("11111111111")).await.unwrap()["Design"],
            "MA"
        );

        let second = design_only(&book, class, text).await;
        assert_eq!(second.applied, 0);
        assert_eq!(second.duplicates, 1);
        assert_eq!(second.failed, 1);
        assert_eq!(
            book.evaluations(class, &id("11111111111")).await.unwrap()["Design"],
            "MA"
        );
    }

    #[tokio::test]
    async fn test_agreeing_repeat_row_is_a_duplicate() {
        let (book, class) = setup().await;
        let text = "cpf,Design\n11111111111,MPA\n111.111.111-11,MPA\n";

        let report = design_only(&book, class, text).await;
        assert_eq!((report.applied, report.duplicates, report.failed), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_blank_row_is_skipped_empty() {
        let (book, class) = setup().await;
        let text = "cpf,Nome,Requirements,Design,Tests\n11111111111,Ana,,,\n";

        let report = ready(&book, class, text).await.apply().await.unwrap();
        assert_eq!(report.empty, 1);
        assert_eq!(report.duplicates, 0);
        assert!(matches!(report.rows[0], RowOutcome::SkippedEmpty { line: 2, .. }));
    }

    #[tokio::test]
    async fn test_unresolved_students_are_row_failures() {
        let (book, class) = setup().await;
        let outsider = book
            .register_student(Student::new("44444444444", "Davi", "d@example.com").unwrap())
            .await
            .unwrap();

        let text = "cpf,Nome,Requirements,Design,Tests\n\
                    99999999999,Ghost,MA,MA,MA\n\
                    44444444444,Davi,MA,MA,MA\n\
                    ,Blank,MA,MA,MA\n\
                    11111111111,Ana,MA,MA,MA\n";
        let report = ready(&book, class, text).await.apply().await.unwrap();

        assert_eq!(report.total_rows, 4);
        assert_eq!(report.failed, 3);
        assert_eq!(report.applied, 1);

        let reasons: Vec<_> = report.failures().map(|f| f.reason.clone()).collect();
        assert!(matches!(reasons[0], RowFailureReason::UnknownStudent { .. }));
        assert!(matches!(reasons[1], RowFailureReason::NotEnrolled { .. }));
        assert_eq!(reasons[2], RowFailureReason::MissingStudentId);
        assert!(book.evaluations(class, &outsider).await.is_err());
    }

    #[tokio::test]
    async fn test_cancel_before_apply_is_a_no_op() {
        let (book, class) = setup().await;
        let mut pipeline = ready(&book, class, SHEET).await;

        pipeline.cancel_handle().cancel();
        assert!(matches!(pipeline.apply().await, Err(ImportError::Cancelled)));
        assert_eq!(pipeline.state(), ImportState::Failed);
        assert!(book.evaluations(class, &id("11111111111")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_while_waiting_for_lock_writes_nothing() {
        let (book, class) = setup().await;
        let mut pipeline = ready(&book, class, SHEET).await;
        let cancel = pipeline.cancel_handle();

        let section = book.class(class).await.unwrap();
        let guard = section.read_book().await;
        let task = tokio::spawn(async move { pipeline.apply().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
        drop(guard);

        assert!(matches!(task.await.unwrap(), Err(ImportError::Cancelled)));
        assert!(book.evaluations(class, &id("11111111111")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_waits_for_readers_and_lands_whole() {
        let (book, class) = setup().await;
        let mut pipeline = ready(&book, class, SHEET).await;

        let section = book.class(class).await.unwrap();
        let guard = section.read_book().await;
        let mut task = tokio::spawn(async move { pipeline.apply().await });

        // The batch cannot land while a reader holds the class.
        assert!(
            tokio::time::timeout(Duration::from_millis(50), &mut task)
                .await
                .is_err()
        );
        assert!(guard.evaluations(&id("11111111111")).unwrap().is_empty());
        drop(guard);

        let report = task.await.unwrap().unwrap();
        assert_eq!(report.applied, 2);
        assert_eq!(book.evaluations(class, &id("11111111111")).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_other_classes_are_not_blocked() {
        let (book, class) = setup().await;
        let other = book
            .create_class(ClassKey::new("ESS", 2025, 2), standard_spec())
            .await
            .unwrap();
        book.enroll(other, &id("11111111111")).await.unwrap();

        let section = book.class(class).await.unwrap();
        let _guard = section.write_book().await;

        let text = "cpf,Design\n11111111111,MA\n";
        let mut pipeline = ImportPipeline::new(book.clone(), other).await.unwrap();
        pipeline.load(&sheet(text)).unwrap();
        pipeline
            .confirm_mapping(&ColumnMapping::new().id_column("cpf").goal("Design", "Design"))
            .unwrap();

        let report = tokio::time::timeout(Duration::from_secs(1), pipeline.apply())
            .await
            .expect("import on another class must not wait")
            .unwrap();
        assert_eq!(report.applied, 1);
    }

    #[test]
    fn test_matching_goals_binds_only_goal_headers() {
        let columns: Vec<String> = ["cpf", "Design", "Notes"].iter().map(|s| s.to_string()).collect();
        let mapping = ColumnMapping::matching_goals(&columns, &standard_spec());
        assert_eq!(mapping.get("Design"), Some(&ColumnBinding::Goal("Design".into())));
        assert_eq!(mapping.get("cpf"), None);
        assert_eq!(mapping.get("Notes"), None);
    }
}
