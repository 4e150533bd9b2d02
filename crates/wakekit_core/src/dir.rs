//! Data directory management.
//!
//! One directory holds everything a context persists:
//!
//! ```text
//! <data_dir>/
//! ├─ LOCK              # Advisory lock, one context per directory
//! ├─ wake.dat          # Wake bookkeeping record
//! ├─ events.log        # Event backlog, one JSON object per line
//! └─ settings.json     # Flat settings object
//! ```

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const RECORD_FILE: &str = "wake.dat";
const EVENT_LOG_FILE: &str = "events.log";
const SETTINGS_FILE: &str = "settings.json";

/// An exclusively locked data directory.
///
/// The lock is released when the value is dropped.
#[derive(Debug)]
pub struct DataDir {
    path: PathBuf,
    _lock_file: File,
}

impl DataDir {
    /// Opens `path`, creating it if missing, and takes the lock.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DirectoryLocked`] if another context holds the
    /// lock, or an I/O error if the directory cannot be created or is not a
    /// directory.
    pub fn open(path: &Path) -> CoreResult<Self> {
        fs::create_dir_all(path)?;
        if !path.is_dir() {
            return Err(CoreError::invalid_layout(format!(
                "data path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::DirectoryLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path of the wake bookkeeping record.
    #[must_use]
    pub fn record_path(&self) -> PathBuf {
        self.path.join(RECORD_FILE)
    }

    /// Returns the path of the event log.
    #[must_use]
    pub fn event_log_path(&self) -> PathBuf {
        self.path.join(EVENT_LOG_FILE)
    }

    /// Returns the path of the settings file.
    #[must_use]
    pub fn settings_path(&self) -> PathBuf {
        self.path.join(SETTINGS_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_missing_directory() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("nested").join("data");
        let dir = DataDir::open(&path).unwrap();
        assert!(path.is_dir());
        assert!(path.join("LOCK").exists());
        assert_eq!(dir.event_log_path(), path.join("events.log"));
    }

    #[test]
    fn second_open_is_locked_out() {
        let temp = tempdir().unwrap();
        let _first = DataDir::open(temp.path()).unwrap();
        assert!(matches!(
            DataDir::open(temp.path()),
            Err(CoreError::DirectoryLocked)
        ));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = tempdir().unwrap();
        {
            let _dir = DataDir::open(temp.path()).unwrap();
        }
        assert!(DataDir::open(temp.path()).is_ok());
    }

    #[test]
    fn file_path_rejected() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("plain");
        fs::write(&file, b"x").unwrap();
        assert!(DataDir::open(&file).is_err());
    }
}
