//! Error types for WakeKit core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in WakeKit core operations.
///
/// Most public operations absorb these and report `bool`; the enum is what
/// internal helpers propagate and what constructors surface.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] wakekit_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON text could not be parsed or produced.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A JSON value had the wrong shape.
    #[error("invalid JSON: {message}")]
    InvalidJson {
        /// Description of the problem.
        message: String,
    },

    /// A record layout or schema is unusable.
    #[error("invalid record layout: {message}")]
    InvalidLayout {
        /// Description of the layout issue.
        message: String,
    },

    /// Another context holds the data directory.
    #[error("data directory locked: another process has exclusive access")]
    DirectoryLocked,
}

impl CoreError {
    /// Creates an invalid JSON error.
    pub fn invalid_json(message: impl Into<String>) -> Self {
        Self::InvalidJson {
            message: message.into(),
        }
    }

    /// Creates an invalid layout error.
    pub fn invalid_layout(message: impl Into<String>) -> Self {
        Self::InvalidLayout {
            message: message.into(),
        }
    }
}
