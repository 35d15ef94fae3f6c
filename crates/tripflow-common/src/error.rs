//! Error types shared by Tripflow crates

use thiserror::Error;

/// Result type alias for Tripflow operations
pub type Result<T> = std::result::Result<T, TripflowError>;

/// Workspace-level error type
///
/// Per-record data problems are not errors and never end up here; they are
/// rejection outcomes owned by the pipeline.
#[derive(Error, Debug)]
pub enum TripflowError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl TripflowError {
    /// Build a configuration error naming the offending variable
    pub fn config(key: &str, reason: impl std::fmt::Display) -> Self {
        TripflowError::Config(format!("{}: {}", key, reason))
    }
}
