//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The record image does not fit the backend.
    #[error("record too large: {len} bytes, capacity {capacity}")]
    RecordTooLarge {
        /// Size of the rejected record image.
        len: usize,
        /// Maximum number of bytes the backend can hold.
        capacity: usize,
    },
}
