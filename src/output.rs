//! Output formatting and persistence for computed statuses and import reports.
//!
//! Supports pretty-printing, JSON serialization, and CSV append.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::analyzers::types::{EnrollmentStatus, Status};
use crate::import::ImportReport;
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// Flat CSV row for one enrollment status.
#[derive(Debug, Serialize)]
pub struct StatusRecord {
    pub timestamp: DateTime<Utc>,
    pub class: String,
    pub student_id: String,
    pub student_name: String,
    pub score: Option<f64>,
    pub graded_goals: usize,
    pub total_goals: usize,
    pub failed_prior: bool,
    pub status: Option<Status>,
}

impl From<&EnrollmentStatus> for StatusRecord {
    fn from(s: &EnrollmentStatus) -> Self {
        StatusRecord {
            timestamp: Utc::now(),
            class: s.class.to_string(),
            student_id: s.student_id.to_string(),
            student_name: s.student_name.clone(),
            score: s.score,
            graded_goals: s.graded_goals,
            total_goals: s.total_goals,
            failed_prior: s.failed_prior,
            status: s.status,
        }
    }
}

/// Logs statuses using Rust's debug pretty-print format.
pub fn print_pretty(statuses: &[EnrollmentStatus]) {
    debug!("{:#?}", statuses);
}

/// Logs an import report as pretty-printed JSON.
pub fn print_json(report: &ImportReport) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

/// Writes an import report as pretty-printed JSON to `path`.
pub fn write_report(path: &str, report: &ImportReport) -> Result<()> {
    std::fs::write(path, serde_json::to_vec_pretty(report)?)?;
    debug!(path, "Import report written");
    Ok(())
}

/// One human-readable line per enrollment.
pub fn status_line(s: &EnrollmentStatus) -> String {
    match (s.score, s.status) {
        (Some(score), Some(status)) => format!(
            "{:<14} {:<24} {:>6.2} {:<6} {}/{} goals{}",
            s.student_id,
            s.student_name,
            score,
            status,
            s.graded_goals,
            s.total_goals,
            if s.failed_prior { " (failed prior offering)" } else { "" }
        ),
        _ => format!(
            "{:<14} {:<24} {:>6} {:<6} not graded yet",
            s.student_id, s.student_name, "-", "-"
        ),
    }
}

/// Appends one CSV row per status to `path`.
///
/// Creates the file with headers if it does not already exist.
pub fn append_records(path: &str, statuses: &[EnrollmentStatus]) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, rows = statuses.len(), "Appending CSV records");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    for status in statuses {
        writer.serialize(StatusRecord::from(status))?;
    }
    writer.flush()?;

    Ok(())
}
