//! CLI command implementations.

pub mod add_event;
pub mod init;
pub mod inspect;
pub mod pack;
pub mod settings;

use crate::error::{CliError, CliResult};
use std::path::Path;
use wakekit_core::{Config, WakeContext};

/// Opens an existing data directory.
///
/// Only `init` creates directories.
pub(crate) fn open_existing(path: &Path, config: Config) -> CliResult<WakeContext> {
    if !path.is_dir() {
        return Err(CliError::NotFound(path.to_path_buf()));
    }
    Ok(WakeContext::open(path, config)?)
}
