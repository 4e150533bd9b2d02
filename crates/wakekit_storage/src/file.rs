//! File-based storage backend for persistent records.

use crate::backend::StorageBackend;
use crate::error::StorageResult;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// A file-based record backend.
///
/// The record image lives in a single file. Saves use a write-then-rename
/// sequence so a crash mid-save leaves either the previous image or the new
/// one on disk, never a mix of both:
///
/// 1. Write the image to `<path>.tmp`
/// 2. Sync the temporary file
/// 3. Rename it over `<path>`
/// 4. Sync the parent directory (Unix only)
///
/// # Example
///
/// ```no_run
/// use wakekit_storage::{FileBackend, StorageBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::new(Path::new("wake.dat"));
/// backend.write_all(b"record image").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
    temp_path: PathBuf,
}

impl FileBackend {
    /// Creates a backend for the record file at `path`.
    ///
    /// Nothing is touched on disk until the first write; a missing file
    /// simply reads as an empty record.
    #[must_use]
    pub fn new(path: &Path) -> Self {
        let mut temp = path.as_os_str().to_owned();
        temp.push(".tmp");
        Self {
            path: path.to_path_buf(),
            temp_path: PathBuf::from(temp),
        }
    }

    /// Returns the path to the record file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(unix)]
    fn sync_parent(&self) -> StorageResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            File::open(parent)?.sync_all()?;
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_parent(&self) -> StorageResult<()> {
        Ok(())
    }
}

impl StorageBackend for FileBackend {
    fn read_into(&self, buf: &mut [u8]) -> StorageResult<usize> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err.into()),
        };

        let mut reader = file.take(buf.len() as u64);
        let mut total = 0;
        loop {
            match reader.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Ok(total)
    }

    fn write_all(&mut self, data: &[u8]) -> StorageResult<()> {
        let mut file = File::create(&self.temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&self.temp_path, &self.path)?;
        self.sync_parent()
    }

    fn size(&self) -> StorageResult<u64> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(err) => Err(err.into()),
        }
    }
}
