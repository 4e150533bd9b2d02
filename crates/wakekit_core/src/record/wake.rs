//! Wake bookkeeping record.

use super::layout::{Field, RecordSchema};
use super::store::RecordStore;
use crate::error::{CoreError, CoreResult};
use std::time::Duration;
use wakekit_storage::StorageBackend;

/// Magic number of the wake bookkeeping record.
pub const WAKE_RECORD_MAGIC: u32 = 0xd82c_b5a4;

/// Layout version of the wake bookkeeping record.
pub const WAKE_RECORD_VERSION: u16 = 1;

/// Timestamps the wake/sleep cycle keeps across sleeps and resets.
///
/// All values are Unix seconds, zero meaning "never".
pub struct WakeRecord {
    store: RecordStore,
    last_update_check: Field<i64>,
    next_update_check: Field<i64>,
    last_full_wake: Field<i64>,
    last_quick_wake: Field<i64>,
}

impl WakeRecord {
    /// Returns the record schema.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the schema is fixed.
    pub fn schema() -> CoreResult<RecordSchema> {
        RecordSchema::builder(WAKE_RECORD_MAGIC, WAKE_RECORD_VERSION)
            .field::<i64>("last_update_check")
            .field::<i64>("next_update_check")
            .field::<i64>("last_full_wake")
            .field::<i64>("last_quick_wake")
            .build()
    }

    /// Creates the record on `backend`. Call [`load`](Self::load) next.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be built.
    pub fn new(backend: impl StorageBackend + 'static, save_delay: Duration) -> CoreResult<Self> {
        let schema = Self::schema()?;
        let field = |name: &str| {
            schema
                .field::<i64>(name)
                .ok_or_else(|| CoreError::invalid_layout(format!("missing field '{name}'")))
        };

        Ok(Self {
            last_update_check: field("last_update_check")?,
            next_update_check: field("next_update_check")?,
            last_full_wake: field("last_full_wake")?,
            last_quick_wake: field("last_quick_wake")?,
            store: RecordStore::with_schema(&schema, backend).with_save_delay(save_delay),
        })
    }

    /// Loads the saved record. Always succeeds; see [`RecordStore::load`].
    pub fn load(&self) -> bool {
        self.store.load()
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// When the cloud was last asked for updates.
    #[must_use]
    pub fn last_update_check(&self) -> i64 {
        self.store.get(self.last_update_check)
    }

    /// Sets when the cloud was last asked for updates.
    pub fn set_last_update_check(&self, value: i64) -> bool {
        self.store.set(self.last_update_check, value)
    }

    /// When the cloud should next be asked for updates.
    #[must_use]
    pub fn next_update_check(&self) -> i64 {
        self.store.get(self.next_update_check)
    }

    /// Sets when the cloud should next be asked for updates.
    pub fn set_next_update_check(&self, value: i64) -> bool {
        self.store.set(self.next_update_check, value)
    }

    /// When the device last woke and connected.
    #[must_use]
    pub fn last_full_wake(&self) -> i64 {
        self.store.get(self.last_full_wake)
    }

    /// Sets when the device last woke and connected.
    pub fn set_last_full_wake(&self, value: i64) -> bool {
        self.store.set(self.last_full_wake, value)
    }

    /// When the device last woke without connecting.
    #[must_use]
    pub fn last_quick_wake(&self) -> i64 {
        self.store.get(self.last_quick_wake)
    }

    /// Sets when the device last woke without connecting.
    pub fn set_last_quick_wake(&self, value: i64) -> bool {
        self.store.set(self.last_quick_wake, value)
    }
}
