pub mod analyzers;
pub mod config;
pub mod error;
pub mod gradebook;
pub mod import;
pub mod infra;
pub mod model;
pub mod output;
pub mod sheet;

pub use error::{GradingError, ImportError};
pub use gradebook::Gradebook;
