//! CLI error type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// `--path` was not given.
    #[error("data directory path required for {0} (use --path)")]
    PathRequired(&'static str),

    /// The data directory does not exist.
    #[error("no data directory found at {}", .0.display())]
    NotFound(PathBuf),

    /// The library refused the input.
    #[error("{0}")]
    Rejected(String),

    /// Core library error.
    #[error(transparent)]
    Core(#[from] wakekit_core::CoreError),

    /// Storage error.
    #[error(transparent)]
    Storage(#[from] wakekit_storage::StorageError),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
