//! # WakeKit Storage
//!
//! Record storage backends for WakeKit.
//!
//! A backend holds the raw bytes of exactly one saved record. Backends are
//! **opaque byte stores** - they do not know about record headers, magic
//! numbers or field layouts. `wakekit_core` owns all interpretation.
//!
//! ## Design Principles
//!
//! - A backend stores one record image (read it back, replace it)
//! - A missing record reads as zero bytes, never as an error
//! - Replacing a record never leaves a torn image behind
//! - Must be `Send + Sync` so stores can be shared across threads
//!
//! ## Available Backends
//!
//! - [`FileBackend`] - Record kept in a file on the flash file system
//! - [`RetainedBackend`] - Record kept in a [`RetainedRegion`], standing in
//!   for battery-backed RAM that survives sleep but not power loss
//!
//! ## Example
//!
//! ```rust
//! use wakekit_storage::{RetainedBackend, RetainedRegion, StorageBackend};
//!
//! let region = RetainedRegion::new();
//! let mut backend = RetainedBackend::new(region.clone());
//! backend.write_all(b"record image").unwrap();
//!
//! let mut buf = [0u8; 32];
//! let n = backend.read_into(&mut buf).unwrap();
//! assert_eq!(&buf[..n], b"record image");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod retained;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use retained::{RetainedBackend, RetainedRegion};
