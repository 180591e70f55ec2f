//! CLI entry point for the gradebook rater.
//!
//! Provides subcommands for inspecting a grade sheet, importing it into a
//! class from a roster snapshot, and printing the Red/Yellow/Green status of
//! every enrollment.

use anyhow::{Context, Result, anyhow};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use gradebook_rater::analyzers::types::{EnrollmentStatus, Status};
use gradebook_rater::config::Settings;
use gradebook_rater::import::{ColumnMapping, ImportPipeline};
use gradebook_rater::infra::roster::RosterFile;
use gradebook_rater::model::{ClassId, ClassKey};
use gradebook_rater::output::{append_records, print_json, print_pretty, status_line, write_report};
use gradebook_rater::sheet::reader_for;
use gradebook_rater::Gradebook;
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "gradebook_rater")]
#[command(about = "Import grade sheets and flag students at risk", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the columns detected in a grade sheet
    Columns {
        /// Path to a .csv, .tsv or .csv.gz sheet
        #[arg(value_name = "SHEET")]
        sheet: String,
    },
    /// Import a grade sheet into a class
    Import {
        /// Roster JSON with students, classes and existing grades
        #[arg(short, long)]
        roster: String,

        /// Class as TOPIC-YEAR-SEMESTER (e.g. "ESS-2025-1")
        #[arg(short, long)]
        class: String,

        /// Path to a .csv, .tsv or .csv.gz sheet
        #[arg(value_name = "SHEET")]
        sheet: String,

        /// Column holding the student national ID
        #[arg(long, default_value = "cpf")]
        id_column: String,

        /// Bind a column to a goal, as COLUMN=GOAL (repeatable)
        #[arg(short, long = "map", value_name = "COLUMN=GOAL")]
        map: Vec<String>,

        /// Column to ignore (repeatable)
        #[arg(short, long)]
        ignore: Vec<String>,

        /// Write the updated roster here (may be the input roster)
        #[arg(long)]
        save: Option<String>,

        /// Write the import report as JSON here
        #[arg(long)]
        report: Option<String>,
    },
    /// Print the status of every enrollment in a class
    Status {
        /// Roster JSON with students, classes and existing grades
        #[arg(short, long)]
        roster: String,

        /// Class as TOPIC-YEAR-SEMESTER (e.g. "ESS-2025-1")
        #[arg(short, long)]
        class: String,

        /// Optional: CSV file to append the statuses to
        #[arg(long)]
        csv: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    let settings = Settings::from_env()?;

    // Logging setup: colored stderr + JSON rolling log file
    let log_dir = Path::new(&settings.log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&settings.log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("gradebook_rater.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Columns { sheet } => {
            let reader = reader_for(&sheet, read_sheet(&sheet)?)?;
            let columns = reader.parse_header()?;
            let rows = reader.parse_rows()?.len();

            info!(sheet = %sheet, rows, "Sheet inspected");
            for (index, column) in columns.iter().enumerate() {
                info!(index, column = %column, "Column");
            }
        }
        Commands::Import {
            roster,
            class,
            sheet,
            id_column,
            map,
            ignore,
            save,
            report,
        } => {
            let gradebook = Arc::new(
                RosterFile::load(&roster)?
                    .into_gradebook(settings.thresholds)
                    .await?,
            );
            let class_id = resolve_class(&gradebook, &class).await?;

            let reader = reader_for(&sheet, read_sheet(&sheet)?)?;
            let mut pipeline = ImportPipeline::new(gradebook.clone(), class_id).await?;
            let columns = pipeline.load(reader.as_ref())?.to_vec();

            let mut mapping = ColumnMapping::matching_goals(&columns, &pipeline.class().grading)
                .id_column(&id_column);
            for binding in &map {
                let (column, goal) = binding
                    .split_once('=')
                    .ok_or_else(|| anyhow!("--map expects COLUMN=GOAL, got '{binding}'"))?;
                mapping = mapping.goal(column.trim(), goal.trim());
            }
            for column in &ignore {
                mapping = mapping.ignore(column);
            }
            pipeline.confirm_mapping(&mapping)?;

            // Ctrl+C before the batch takes the class lock aborts it cleanly.
            let cancel = pipeline.cancel_handle();
            let interrupt = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, cancelling import");
                    cancel.cancel();
                }
            });
            let result = pipeline.apply().await;
            interrupt.abort();
            let import_report = result?;

            print_json(&import_report)?;
            if let Some(path) = report {
                write_report(&path, &import_report)?;
            }

            print_statuses(&gradebook, class_id).await?;

            if let Some(path) = save {
                RosterFile::from_gradebook(&gradebook).await.save(&path)?;
            }
        }
        Commands::Status { roster, class, csv } => {
            let gradebook = RosterFile::load(&roster)?
                .into_gradebook(settings.thresholds)
                .await?;
            let class_id = resolve_class(&gradebook, &class).await?;

            let statuses = print_statuses(&gradebook, class_id).await?;
            if let Some(path) = csv {
                append_records(&path, &statuses)?;
                info!(path = %path, rows = statuses.len(), "Statuses appended");
            }
        }
    }

    Ok(())
}

/// Reads a grade sheet from disk.
#[tracing::instrument]
fn read_sheet(path: &str) -> Result<Bytes> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read sheet {path}"))?;
    Ok(Bytes::from(bytes))
}

async fn resolve_class(gradebook: &Gradebook, class: &str) -> Result<ClassId> {
    let key: ClassKey = class.parse()?;
    gradebook
        .find_class(&key)
        .await
        .ok_or_else(|| anyhow!("class {key} is not in the roster"))
}

async fn print_statuses(
    gradebook: &Gradebook,
    class_id: ClassId,
) -> Result<Vec<EnrollmentStatus>> {
    let statuses = gradebook.class_statuses(class_id).await?;
    print_pretty(&statuses);
    for status in &statuses {
        info!("{}", status_line(status));
    }

    let count = |color: Status| statuses.iter().filter(|s| s.status == Some(color)).count();
    info!(
        total = statuses.len(),
        green = count(Status::Green),
        yellow = count(Status::Yellow),
        red = count(Status::Red),
        not_graded = statuses.iter().filter(|s| !s.is_computable()).count(),
        "Class status summary"
    );
    Ok(statuses)
}
