//! # WakeKit Core
//!
//! Persistence and telemetry packing for devices that spend most of their
//! life asleep.
//!
//! This crate provides:
//! - Versioned fixed-layout binary records that survive sleep and reset
//!   ([`record`])
//! - A durable, crash-tolerant event backlog ([`event_log`])
//! - A packer that merges prioritized fields and backlog into size-bounded
//!   JSON payloads ([`packer`])
//! - A flat JSON settings file with change notification ([`settings`])
//! - [`WakeContext`], which opens a data directory and wires it all up
//!
//! ## Example
//!
//! ```rust
//! use wakekit_core::{Config, WakeContext};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let ctx = WakeContext::open(dir.path(), Config::default()).unwrap();
//!
//! ctx.packer().add_callback(|writer, priority| {
//!     writer.key_value("battery", &92);
//!     *priority = 60;
//! });
//! ctx.event_log().add_event(r#"{"motion":true}"#);
//!
//! for payload in ctx.build_payloads() {
//!     assert!(payload.len() <= 1024);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod callbacks;
mod config;
mod context;
mod dir;
mod error;
pub mod event_log;
pub mod hash;
pub mod json;
pub mod packer;
pub mod record;
pub mod settings;

pub use config::{Config, WakeEventKind};
pub use context::WakeContext;
pub use dir::DataDir;
pub use error::{CoreError, CoreResult};
pub use event_log::EventLog;
pub use packer::{EventPacker, Fragment};
pub use record::{RecordSchema, RecordStore, WakeRecord};
pub use settings::SettingsFile;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
