//! The wake/sleep context: one data directory and everything built on it.

use crate::callbacks::CallbackList;
use crate::config::{Config, WakeEventKind};
use crate::dir::DataDir;
use crate::error::CoreResult;
use crate::event_log::EventLog;
use crate::json::splice_value;
use crate::packer::EventPacker;
use crate::record::WakeRecord;
use crate::settings::SettingsFile;
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use wakekit_storage::FileBackend;

/// Owns the persistent state of one device and the hooks around its
/// wake/sleep cycle.
///
/// A context is opened on a data directory and holds an exclusive lock on
/// it until dropped. It is `Send + Sync`; every component synchronizes
/// internally.
///
/// # Example
///
/// ```rust
/// use wakekit_core::{Config, WakeContext, WakeEventKind};
///
/// let dir = tempfile::tempdir().unwrap();
/// let ctx = WakeContext::open(dir.path(), Config::default()).unwrap();
///
/// ctx.event_log().add_event(r#"{"door":"open"}"#);
/// ctx.add_wake_event(WakeEventKind::WakeReason, 2);
///
/// let payloads = ctx.build_payloads();
/// assert_eq!(payloads, [r#"{"wr":2,"eh":[{"door":"open"}]}"#]);
/// ```
pub struct WakeContext {
    config: Config,
    record: WakeRecord,
    event_log: Arc<EventLog>,
    settings: SettingsFile,
    packer: Mutex<EventPacker>,
    loop_hooks: Mutex<CallbackList<()>>,
    sleep_ready_hooks: Mutex<CallbackList<()>>,
    sleep_hooks: Mutex<CallbackList<bool>>,
    dir: DataDir,
}

impl std::fmt::Debug for WakeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WakeContext")
            .field("dir", &self.dir.path())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl WakeContext {
    /// Opens the data directory at `path`, creating it if needed.
    ///
    /// Loads the wake record and the settings; the event log is read
    /// lazily.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DirectoryLocked`](crate::CoreError::DirectoryLocked) if another context has the
    /// directory open, or an error if it cannot be created.
    pub fn open(path: &Path, config: Config) -> CoreResult<Self> {
        let dir = DataDir::open(path)?;

        let record = WakeRecord::new(FileBackend::new(&dir.record_path()), config.save_delay)?;
        record.load();

        let event_log = Arc::new(
            EventLog::new(&dir.event_log_path()).with_max_event_size(config.max_event_size),
        );

        let settings = SettingsFile::new(&dir.settings_path());
        settings.load();

        let packer = EventPacker::new()
            .with_event_log(Arc::clone(&event_log))
            .with_history_key(config.history_key.clone())
            .with_new_payload_min_priority(config.new_payload_min_priority);

        tracing::debug!(path = %path.display(), "wake context opened");

        Ok(Self {
            config,
            record,
            event_log,
            settings,
            packer: Mutex::new(packer),
            loop_hooks: Mutex::new(CallbackList::new()),
            sleep_ready_hooks: Mutex::new(CallbackList::new()),
            sleep_hooks: Mutex::new(CallbackList::new()),
            dir,
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the data directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Returns the wake bookkeeping record.
    #[must_use]
    pub fn record(&self) -> &WakeRecord {
        &self.record
    }

    /// Returns the event log.
    #[must_use]
    pub fn event_log(&self) -> &Arc<EventLog> {
        &self.event_log
    }

    /// Returns the settings.
    #[must_use]
    pub fn settings(&self) -> &SettingsFile {
        &self.settings
    }

    /// Locks and returns the packer, to register generators.
    ///
    /// Do not hold the guard across [`build_payloads`](Self::build_payloads).
    pub fn packer(&self) -> MutexGuard<'_, EventPacker> {
        self.packer.lock()
    }

    /// Attaches a built-in wake event to the next payload.
    ///
    /// Returns `false` if `kind` is disabled in the configuration or `value`
    /// is not representable as JSON.
    pub fn add_wake_event<T: Serialize>(&self, kind: WakeEventKind, value: T) -> bool {
        if !self.config.is_wake_event_enabled(kind) {
            return false;
        }
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(err) => {
                tracing::debug!(kind = %kind, error = %err, "wake event value not representable");
                return false;
            }
        };

        self.packer.lock().add_one_shot(move |writer, priority| {
            writer.name(kind.key());
            splice_value(&value, writer);
            *priority = kind.priority();
        });
        true
    }

    /// Records that the device woke and connected at `now` (Unix seconds).
    pub fn mark_full_wake(&self, now: i64) -> bool {
        self.record.set_last_full_wake(now)
    }

    /// Records that the device woke without connecting at `now`.
    pub fn mark_quick_wake(&self, now: i64) -> bool {
        self.record.set_last_quick_wake(now)
    }

    /// Packs pending fields and event history with the configured budget.
    pub fn build_payloads(&self) -> Vec<String> {
        self.build_payloads_with(self.config.max_payload_size)
    }

    /// Packs pending fields and event history into payloads of at most
    /// `max_size` bytes, less the reserve.
    pub fn build_payloads_with(&self, max_size: usize) -> Vec<String> {
        self.packer.lock().generate_events(max_size)
    }

    /// Registers a hook for every [`tick`](Self::tick).
    pub fn add_loop_hook<F>(&self, mut hook: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.loop_hooks.lock().add(move |_| {
            hook();
            true
        });
    }

    /// Registers a hook that can veto sleep by returning `false`.
    pub fn add_sleep_ready_hook<F>(&self, mut hook: F)
    where
        F: FnMut() -> bool + Send + 'static,
    {
        self.sleep_ready_hooks.lock().add(move |_| hook());
    }

    /// Registers a hook run before sleep; its argument says whether the
    /// device is about to reset rather than sleep.
    pub fn add_sleep_hook<F>(&self, mut hook: F)
    where
        F: FnMut(bool) + Send + 'static,
    {
        self.sleep_hooks.lock().add(move |is_reset| {
            hook(*is_reset);
            true
        });
    }

    /// Periodic work: saves a deferred record change once its delay has
    /// passed, then runs the loop hooks.
    pub fn tick(&self) {
        if !self.record.store().flush(false) {
            tracing::warn!("deferred wake record save failed, retrying next tick");
        }
        self.loop_hooks.lock().run_all(&());
    }

    /// Returns whether every sleep-ready hook agrees to sleep.
    pub fn is_sleep_ready(&self) -> bool {
        self.sleep_ready_hooks.lock().until_false(&(), true)
    }

    /// Runs the sleep hooks, then saves the record unconditionally.
    pub fn prepare_to_sleep(&self, is_reset: bool) {
        self.sleep_hooks.lock().run_all(&is_reset);
        if !self.record.store().flush(true) {
            tracing::warn!("wake record not saved before sleep");
        }
        tracing::debug!(is_reset, "prepared to sleep");
    }
}

// Compile-time check that a context can be shared across threads
#[allow(dead_code)]
fn assert_send_sync() {
    fn check<T: Send + Sync>() {}
    check::<WakeContext>();
}
