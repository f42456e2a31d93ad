//! Shared configuration types for belt jobs.

mod job;
mod progress;

pub use job::JobConfig;
pub use progress::ProgressConfig;

use thiserror::Error;

/// Validation failure for configuration values.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
}
