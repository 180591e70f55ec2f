//! Runtime settings and the named thresholds used to color enrollments.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::GradingError;

/// Scores strictly below this are Red.
pub const DEFAULT_PASS_THRESHOLD: f64 = 4.0;

/// Scores at or above this are Green.
pub const DEFAULT_SAFE_THRESHOLD: f64 = 9.0;

/// Goals whose lowest-level grade in a prior offering signals risk.
pub const RISK_INDICATOR_GOALS: [&str; 2] = ["Requirements", "Project Management"];

/// How many risk-indicator goals must hold the lowest grade to count as a failure.
pub const MIN_FAILED_RISK_GOALS: usize = 2;

const DEFAULT_LOG_FILE: &str = "logs/gradebook_rater.log";

/// Band boundaries for the Red/Yellow/Green classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatusThresholds {
    pub pass: f64,
    pub safe: f64,
}

impl StatusThresholds {
    pub const DEFAULT: StatusThresholds = StatusThresholds {
        pass: DEFAULT_PASS_THRESHOLD,
        safe: DEFAULT_SAFE_THRESHOLD,
    };

    /// Validates `0 < pass <= safe`.
    pub fn new(pass: f64, safe: f64) -> Result<Self, GradingError> {
        if !(pass.is_finite() && safe.is_finite()) || pass <= 0.0 || pass > safe {
            return Err(GradingError::Configuration(format!(
                "thresholds must satisfy 0 < pass <= safe (got pass={pass}, safe={safe})"
            )));
        }
        Ok(Self { pass, safe })
    }
}

impl Default for StatusThresholds {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Process-wide settings, read from the environment (after `.env` is loaded).
#[derive(Debug, Clone)]
pub struct Settings {
    pub log_file_path: String,
    pub thresholds: StatusThresholds,
}

impl Settings {
    /// Reads `LOG_FILE_PATH`, `GRADEBOOK_PASS_THRESHOLD` and `GRADEBOOK_SAFE_THRESHOLD`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let log_file_path =
            lookup("LOG_FILE_PATH").unwrap_or_else(|| DEFAULT_LOG_FILE.to_string());

        let read = |key: &str, default: f64| -> Result<f64> {
            match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse::<f64>()
                    .with_context(|| format!("{key} must be a number, got '{raw}'")),
                None => Ok(default),
            }
        };

        let pass = read("GRADEBOOK_PASS_THRESHOLD", DEFAULT_PASS_THRESHOLD)?;
        let safe = read("GRADEBOOK_SAFE_THRESHOLD", DEFAULT_SAFE_THRESHOLD)?;

        Ok(Self {
            log_file_path,
            thresholds: StatusThresholds::new(pass, safe)?,
        })
    }
}
