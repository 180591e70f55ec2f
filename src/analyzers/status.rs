use crate::analyzers::types::Status;
use crate::config::StatusThresholds;

/// Maps a weighted score to a risk status.
///
/// | Score range            | Status |
/// |------------------------|--------|
/// | >= `safe`              | Green  |
/// | >= `pass`, < `safe`    | Yellow |
/// | < `pass`               | Red    |
///
/// A failed prior offering downgrades Green to Yellow. It never moves a
/// score into Red and never changes Yellow or Red.
pub fn classify(score: f64, failed_prior: bool, thresholds: &StatusThresholds) -> Status {
    let raw = match score {
        s if s >= thresholds.safe => Status::Green,
        s if s >= thresholds.pass => Status::Yellow,
        _ => Status::Red,
    };

    match raw {
        Status::Green if failed_prior => Status::Yellow,
        other => other,
    }
}
