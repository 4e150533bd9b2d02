//! Append-only event log with two-phase consumption.
//!
//! The log is a UTF-8 text file holding one JSON object per line, oldest
//! first. Delivery is a two-step affair:
//!
//! 1. [`EventLog::get_events`] reads a prefix of the file, renders the
//!    complete records in it as a JSON array and remembers how many bytes
//!    they occupied (the pending cursor).
//! 2. [`EventLog::remove_events`] drops exactly those bytes, either by
//!    deleting the file or by copying the remainder to a temporary file and
//!    renaming it over the log.
//!
//! ## Invariants
//!
//! - Records are delivered in append order
//! - A process restart between the two steps re-delivers the same records;
//!   nothing is removed until step 2 completes
//! - Records appended between the two steps survive step 2, because removal
//!   is by byte offset, never by truncating the file
//! - A trailing partial record (crash mid-append) is never delivered

use crate::json::{self, splice_value, JsonWriter};
use parking_lot::ReentrantMutex;
use serde_json::Value;
use std::cell::RefCell;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Default cap on a record built with [`EventLog::add_event_with`].
pub const DEFAULT_MAX_EVENT_SIZE: usize = 1024;

#[derive(Debug, Default)]
struct LogState {
    /// `None` until the file has been checked once.
    has_events: Option<bool>,
    /// Bytes handed out by the last `get_events` and not yet removed.
    pending: Option<u64>,
}

/// Durable FIFO of JSON-object records.
///
/// Every public method holds a per-log re-entrant lock for its duration.
/// I/O failures are logged and reported as `false`; a missing file is
/// simply an empty log.
///
/// # Example
///
/// ```rust
/// use wakekit_core::event_log::EventLog;
/// use wakekit_core::json::JsonWriter;
///
/// let dir = tempfile::tempdir().unwrap();
/// let log = EventLog::new(&dir.path().join("events.log"));
/// log.add_event(r#"{"temp":21.5}"#);
///
/// let mut writer = JsonWriter::unbounded();
/// assert!(log.get_events(&mut writer, 256, true));
/// assert_eq!(writer.as_str(), r#"[{"temp":21.5}]"#);
/// assert!(!log.has_events());
/// ```
#[derive(Debug)]
pub struct EventLog {
    path: PathBuf,
    temp_path: PathBuf,
    max_event_size: usize,
    inner: ReentrantMutex<RefCell<LogState>>,
}

impl EventLog {
    /// Creates a log backed by the file at `path`.
    ///
    /// The file is not touched until the first append or query.
    #[must_use]
    pub fn new(path: &Path) -> Self {
        let mut temp = path.as_os_str().to_owned();
        temp.push(".tmp");
        Self {
            path: path.to_path_buf(),
            temp_path: PathBuf::from(temp),
            max_event_size: DEFAULT_MAX_EVENT_SIZE,
            inner: ReentrantMutex::new(RefCell::new(LogState::default())),
        }
    }

    /// Sets the cap for records built with [`add_event_with`](Self::add_event_with).
    #[must_use]
    pub fn with_max_event_size(mut self, size: usize) -> Self {
        self.max_event_size = size;
        self
    }

    /// Returns the path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one serialized JSON object.
    ///
    /// Returns `false` if `json` is not a JSON object or the append failed.
    /// Objects spread over several lines are compacted onto one.
    pub fn add_event(&self, json: &str) -> bool {
        let value: Value = match serde_json::from_str(json) {
            Ok(value) => value,
            Err(err) => {
                tracing::debug!(error = %err, "rejecting event that is not valid JSON");
                return false;
            }
        };
        if !value.is_object() {
            tracing::debug!("rejecting event that is not a JSON object");
            return false;
        }

        let mut line = if json.contains(['\n', '\r']) {
            match serde_json::to_string(&value) {
                Ok(compact) => compact,
                Err(_) => return false,
            }
        } else {
            json.trim().to_string()
        };
        line.push('\n');

        let guard = self.inner.lock();
        match self.append_line(&line) {
            Ok(()) => {
                guard.borrow_mut().has_events = Some(true);
                true
            }
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "failed to append event");
                false
            }
        }
    }

    /// Builds one object with `build` and appends it.
    ///
    /// `build` writes the members; the braces are added around them. Returns
    /// `false` if the object outgrew the maximum event size, was left
    /// unbalanced, or could not be appended.
    pub fn add_event_with<F>(&self, build: F) -> bool
    where
        F: FnOnce(&mut JsonWriter),
    {
        let mut writer = JsonWriter::new(self.max_event_size);
        writer.begin_object();
        build(&mut writer);
        writer.end_object();

        if writer.is_truncated() || !writer.is_balanced() {
            tracing::debug!(
                size = writer.data_size(),
                max = self.max_event_size,
                "event builder output rejected"
            );
            return false;
        }
        self.add_event(writer.as_str())
    }

    /// Writes the oldest records, as one JSON array, into `writer`.
    ///
    /// Reads at most `max_bytes` from the front of the log and keeps only
    /// complete records; the array written is never longer than
    /// `max_bytes - 1`. Returns `false`, writing nothing, if there are no
    /// events or not even one complete record fits.
    ///
    /// The records stay in the log until [`remove_events`] runs. With
    /// `remove_after` set that happens before returning; otherwise the
    /// caller must call it once the records are safely delivered, and must
    /// not call `get_events` again in between.
    ///
    /// Lines that are not JSON objects are consumed without being delivered.
    ///
    /// [`remove_events`]: Self::remove_events
    pub fn get_events(&self, writer: &mut JsonWriter, max_bytes: usize, remove_after: bool) -> bool {
        if max_bytes < 2 || !self.has_events() {
            return false;
        }

        let guard = self.inner.lock();
        let entries = loop {
            let data = match self.read_prefix(max_bytes) {
                Ok(data) => data,
                Err(err) => {
                    tracing::warn!(path = %self.path.display(), error = %err, "failed to read event log");
                    return false;
                }
            };
            let Some((entries, consumed)) = collect_entries(&data, max_bytes) else {
                return false;
            };
            // The first record alone does not fit the budget
            if consumed == 0 {
                guard.borrow_mut().pending = None;
                return false;
            }
            guard.borrow_mut().pending = Some(consumed);

            if !entries.is_empty() {
                break entries;
            }
            // Only unreadable lines in front; drop them and look again
            if !self.remove_events() || !self.has_events() {
                return false;
            }
        };

        writer.begin_array();
        for entry in &entries {
            splice_value(entry, writer);
        }
        writer.end_array();

        if remove_after {
            self.remove_events();
        }
        true
    }

    /// Removes the records handed out by the last [`get_events`](Self::get_events).
    ///
    /// Deletes the file when everything was consumed; otherwise rewrites the
    /// unconsumed tail through a temporary file. If the rewrite fails the
    /// original log is left in place and the records will be delivered
    /// again. Returns `false` on I/O failure.
    pub fn remove_events(&self) -> bool {
        let guard = self.inner.lock();
        let Some(cursor) = guard.borrow_mut().pending.take() else {
            return true;
        };

        match self.remove_prefix(cursor) {
            Ok(remaining) => {
                guard.borrow_mut().has_events = Some(remaining > 0);
                true
            }
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "failed to remove delivered events");
                let _ = fs::remove_file(&self.temp_path);
                false
            }
        }
    }

    /// Forgets the last `get_events` without removing anything.
    ///
    /// The records stay at the front of the log and are handed out again by
    /// the next `get_events`.
    pub fn release_events(&self) {
        self.inner.lock().borrow_mut().pending = None;
    }

    /// Returns whether the log holds anything.
    ///
    /// The first call checks the file, which picks up records left by a
    /// previous run; later calls answer from memory.
    pub fn has_events(&self) -> bool {
        let guard = self.inner.lock();
        let mut state = guard.borrow_mut();
        *state.has_events.get_or_insert_with(|| match fs::metadata(&self.path) {
            Ok(meta) => meta.len() > 0,
            Err(_) => false,
        })
    }

    /// Returns the byte offset reserved by an uncommitted `get_events`.
    #[must_use]
    pub fn pending_offset(&self) -> Option<u64> {
        self.inner.lock().borrow().pending
    }

    /// Returns the size of the log file, zero if it does not exist.
    #[must_use]
    pub fn size(&self) -> u64 {
        fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }

    fn append_line(&self, line: &str) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)?;

        // Terminate a partial record left by a crash so it cannot swallow
        // this one
        let len = file.metadata()?.len();
        let mut record = String::with_capacity(line.len() + 1);
        if len > 0 {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::Start(len - 1))?;
            file.read_exact(&mut last)?;
            if last[0] != b'\n' {
                record.push('\n');
            }
        }
        record.push_str(line);

        file.write_all(record.as_bytes())?;
        file.flush()
    }

    fn read_prefix(&self, max_bytes: usize) -> io::Result<Vec<u8>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };
        let mut data = Vec::with_capacity(max_bytes.min(64 * 1024));
        file.take(max_bytes as u64).read_to_end(&mut data)?;
        Ok(data)
    }

    /// Drops the first `cursor` bytes; returns how many bytes remain.
    fn remove_prefix(&self, cursor: u64) -> io::Result<u64> {
        let size = match fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err),
        };

        if cursor >= size {
            match fs::remove_file(&self.path) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(err),
            }
            tracing::debug!(path = %self.path.display(), "event log drained");
            return Ok(0);
        }

        let mut src = File::open(&self.path)?;
        src.seek(SeekFrom::Start(cursor))?;
        let mut dst = File::create(&self.temp_path)?;
        let copied = io::copy(&mut src, &mut dst)?;
        dst.sync_all()?;
        drop(dst);
        drop(src);

        fs::rename(&self.temp_path, &self.path)?;
        sync_parent(&self.path)?;
        tracing::debug!(removed = cursor, remaining = copied, "event log compacted");
        Ok(copied)
    }
}

/// Parses the complete lines in `data`.
///
/// Returns the accepted records and the number of bytes they (and any
/// skipped lines before the cut-off) occupy, or `None` if `data` holds no
/// complete line at all.
fn collect_entries(data: &[u8], max_bytes: usize) -> Option<(Vec<Value>, u64)> {
    let end = data.iter().rposition(|&b| b == b'\n')? + 1;

    let mut entries = Vec::new();
    let mut consumed = 0u64;
    // Array brackets
    let mut used = 2usize;

    for line in data[..end].split_inclusive(|&b| b == b'\n') {
        let body = &line[..line.len() - 1];
        match serde_json::from_slice::<Value>(body) {
            Ok(value) if value.is_object() => {
                let rendered = json::normalized(&value);
                // Record plus its separator
                if used + rendered.len() + 1 > max_bytes {
                    break;
                }
                used += rendered.len() + 1;
                entries.push(value);
            }
            _ => {
                if !body.iter().all(u8::is_ascii_whitespace) {
                    tracing::warn!(len = body.len(), "skipping unreadable event log line");
                }
            }
        }
        consumed += line.len() as u64;
    }

    Some((entries, consumed))
}

#[cfg(unix)]
fn sync_parent(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        File::open(parent)?.sync_all()?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> io::Result<()> {
    Ok(())
}
