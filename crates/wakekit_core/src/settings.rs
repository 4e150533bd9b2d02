//! Flat key/value settings persisted as one JSON object.

use crate::callbacks::CallbackList;
use crate::hash::{murmur3_32, HASH_SEED};
use crate::json::{splice_value, JsonWriter};
use parking_lot::{Mutex, ReentrantMutex};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::path::Path;
use wakekit_storage::{FileBackend, StorageBackend, StorageResult};

struct SettingsState {
    values: Map<String, Value>,
    backend: FileBackend,
}

/// Settings file with change notification.
///
/// Values live in memory and are written back through a [`FileBackend`]
/// whenever they change. Keys are kept in insertion order so that
/// [`values_json`](Self::values_json) and [`hash`](Self::hash) are stable
/// across runs.
///
/// Change listeners run after the change is stored and the internal lock
/// state is released, so they may read settings. They must not register
/// further listeners.
///
/// # Example
///
/// ```rust
/// use wakekit_core::settings::SettingsFile;
///
/// let dir = tempfile::tempdir().unwrap();
/// let settings = SettingsFile::new(&dir.path().join("settings.json"));
/// settings.load();
///
/// settings.set_value("interval", 900);
/// assert_eq!(settings.get_value::<u32>("interval"), Some(900));
/// assert_eq!(settings.values_json(), r#"{"interval":900}"#);
/// ```
pub struct SettingsFile {
    defaults: Map<String, Value>,
    inner: ReentrantMutex<RefCell<SettingsState>>,
    listeners: Mutex<CallbackList<str>>,
}

impl std::fmt::Debug for SettingsFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guard = self.inner.lock();
        let state = guard.borrow();
        f.debug_struct("SettingsFile")
            .field("path", &state.backend.path())
            .field("values", &state.values.len())
            .field("defaults", &self.defaults.len())
            .finish()
    }
}

impl SettingsFile {
    /// Creates settings backed by the file at `path`. Call [`load`](Self::load) next.
    #[must_use]
    pub fn new(path: &Path) -> Self {
        Self {
            defaults: Map::new(),
            inner: ReentrantMutex::new(RefCell::new(SettingsState {
                values: Map::new(),
                backend: FileBackend::new(path),
            })),
            listeners: Mutex::new(CallbackList::new()),
        }
    }

    /// Sets values to fill in on every load when the file lacks them.
    #[must_use]
    pub fn with_default_values(mut self, defaults: Map<String, Value>) -> Self {
        self.defaults = defaults;
        self
    }

    /// Reads the file, then fills in missing defaults.
    ///
    /// A missing or unreadable file yields an empty object. When a default
    /// was filled in, the merged values are written back. Returns whether
    /// the file was read successfully.
    pub fn load(&self) -> bool {
        let guard = self.inner.lock();
        let (ok, filled) = {
            let mut state = guard.borrow_mut();

            let (mut values, ok) = match read_object(&state.backend) {
                Ok(Some(values)) => (values, true),
                Ok(None) => (Map::new(), false),
                Err(err) => {
                    tracing::warn!(path = %state.backend.path().display(), error = %err, "failed to read settings");
                    (Map::new(), false)
                }
            };
            let mut filled = false;
            for (key, value) in &self.defaults {
                if !values.contains_key(key) {
                    values.insert(key.clone(), value.clone());
                    filled = true;
                }
            }
            state.values = values;
            tracing::debug!(keys = state.values.len(), filled, "settings loaded");
            (ok, filled)
        };

        if filled {
            self.save();
        }
        ok
    }

    /// Writes the values back to the file.
    pub fn save(&self) -> bool {
        let guard = self.inner.lock();
        let mut state = guard.borrow_mut();
        let text = render(&state.values);
        match state.backend.write_all(text.as_bytes()) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(path = %state.backend.path().display(), error = %err, "failed to save settings");
                false
            }
        }
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> std::path::PathBuf {
        self.inner.lock().borrow().backend.path().to_path_buf()
    }

    /// Returns `key` converted to `T`, or `None` if missing or of another type.
    #[must_use]
    pub fn get_value<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let guard = self.inner.lock();
        let state = guard.borrow();
        let value = state.values.get(key)?.clone();
        serde_json::from_value(value).ok()
    }

    /// Stores `value` under `key`, saving and notifying if it changed.
    ///
    /// Returns `false` if `value` cannot be represented as JSON or the save
    /// failed.
    pub fn set_value<T: Serialize>(&self, key: &str, value: T) -> bool {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(err) => {
                tracing::debug!(key, error = %err, "setting value not representable as JSON");
                return false;
            }
        };

        let mut incoming = Map::new();
        incoming.insert(key.to_string(), value);
        self.apply(incoming, false)
    }

    /// Replaces every value with the members of the JSON object `json`.
    ///
    /// Keys that are new or changed are reported to listeners. Returns
    /// `false` if `json` is not an object or the save failed.
    pub fn set_values_json(&self, json: &str) -> bool {
        match parse_object(json) {
            Some(incoming) => self.apply(incoming, true),
            None => false,
        }
    }

    /// Merges the members of the JSON object `json` into the values.
    ///
    /// Keys not in `json` are kept. Returns `false` if `json` is not an
    /// object or the save failed.
    pub fn update_values_json(&self, json: &str) -> bool {
        match parse_object(json) {
            Some(incoming) => self.apply(incoming, false),
            None => false,
        }
    }

    /// Adds members of `json` whose keys are not set yet. No notification.
    pub fn add_default_values(&self, json: &str) -> bool {
        let Some(incoming) = parse_object(json) else {
            return false;
        };

        let guard = self.inner.lock();
        let added = {
            let mut state = guard.borrow_mut();
            let mut added = false;
            for (key, value) in incoming {
                if !state.values.contains_key(&key) {
                    state.values.insert(key, value);
                    added = true;
                }
            }
            added
        };
        !added || self.save()
    }

    /// Returns all values as compact JSON text.
    #[must_use]
    pub fn values_json(&self) -> String {
        render(&self.inner.lock().borrow().values)
    }

    /// Writes all values, as one object, into `writer`.
    pub fn write_values(&self, writer: &mut JsonWriter) {
        let guard = self.inner.lock();
        let state = guard.borrow();
        writer.begin_object();
        for (key, value) in &state.values {
            writer.name(key);
            splice_value(value, writer);
        }
        writer.end_object();
    }

    /// Registers `listener` to be called with each changed key.
    pub fn on_setting_change<F>(&self, mut listener: F)
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.listeners.lock().add(move |key| {
            listener(key);
            true
        });
    }

    /// Returns a MurmurHash3 fingerprint of [`values_json`](Self::values_json).
    #[must_use]
    pub fn hash(&self) -> u32 {
        murmur3_32(self.values_json().as_bytes(), HASH_SEED)
    }

    /// Stores `incoming`, optionally dropping keys it lacks, then saves and
    /// notifies.
    fn apply(&self, incoming: Map<String, Value>, replace: bool) -> bool {
        let guard = self.inner.lock();
        let (changed, removed) = {
            let mut state = guard.borrow_mut();
            let changed: Vec<String> = incoming
                .iter()
                .filter(|(key, value)| state.values.get(key.as_str()) != Some(*value))
                .map(|(key, _)| key.clone())
                .collect();

            let removed = if replace {
                let before = state.values.len();
                state.values.retain(|key, _| incoming.contains_key(key));
                before != state.values.len()
            } else {
                false
            };

            for (key, value) in incoming {
                state.values.insert(key, value);
            }
            (changed, removed)
        };

        if changed.is_empty() && !removed {
            return true;
        }
        let saved = self.save();
        drop(guard);

        let mut listeners = self.listeners.lock();
        for key in &changed {
            tracing::debug!(key = key.as_str(), "setting changed");
            listeners.run_all(key.as_str());
        }
        saved
    }
}

fn render(values: &Map<String, Value>) -> String {
    let mut writer = JsonWriter::unbounded();
    writer.begin_object();
    for (key, value) in values {
        writer.name(key);
        splice_value(value, &mut writer);
    }
    writer.end_object();
    writer.into_string()
}

fn parse_object(json: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str(json) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => {
            tracing::debug!("settings update is not a JSON object");
            None
        }
        Err(err) => {
            tracing::debug!(error = %err, "settings update is not valid JSON");
            None
        }
    }
}

/// `Ok(None)` when the file is missing, empty, or not a JSON object.
fn read_object(backend: &FileBackend) -> StorageResult<Option<Map<String, Value>>> {
    let size = usize::try_from(backend.size()?).unwrap_or(usize::MAX);
    if size == 0 {
        return Ok(None);
    }
    let mut buf = vec![0u8; size];
    let n = backend.read_into(&mut buf)?;
    buf.truncate(n);

    match serde_json::from_slice(&buf) {
        Ok(Value::Object(map)) => Ok(Some(map)),
        Ok(_) => {
            tracing::warn!(path = %backend.path().display(), "settings file is not a JSON object, ignoring");
            Ok(None)
        }
        Err(err) => {
            tracing::warn!(path = %backend.path().display(), error = %err, "settings file is corrupt, ignoring");
            Ok(None)
        }
    }
}
