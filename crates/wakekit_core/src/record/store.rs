//! Durable fixed-layout record store.

use super::layout::{Field, RecordHeader, RecordLayout, RecordSchema, StringField, HEADER_SIZE};
use super::value::FieldValue;
use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::time::{Duration, Instant};
use wakekit_storage::StorageBackend;

struct StoreState {
    buf: Vec<u8>,
    backend: Box<dyn StorageBackend>,
    dirty_since: Option<Instant>,
}

/// A fixed-layout binary record with bounds-checked typed accessors.
///
/// The store owns one in-memory image of the record. Setters change the
/// image and then either persist it immediately (save delay of zero) or
/// mark it dirty so a later [`flush`] persists it. The in-memory image is
/// always authoritative: a failed save is logged, the image stays dirty and
/// the next flush tries again.
///
/// Every public method holds a per-store re-entrant lock for its duration.
///
/// # Failure Semantics
///
/// - A missing, short, or foreign record on the backend never fails
///   [`load`]: the store falls back to a zero-filled default.
/// - Out-of-bounds reads return the type's zero value; out-of-bounds writes
///   do nothing and return `false`.
///
/// # Example
///
/// ```rust
/// use wakekit_core::record::{RecordSchema, RecordStore};
/// use wakekit_storage::{RetainedBackend, RetainedRegion};
///
/// let schema = RecordSchema::builder(0x1234_5678, 1)
///     .field::<u32>("boots")
///     .build()
///     .unwrap();
/// let boots = schema.field::<u32>("boots").unwrap();
///
/// let store = RecordStore::with_schema(&schema, RetainedBackend::new(RetainedRegion::new()));
/// store.load();
/// store.set(boots, store.get(boots) + 1);
/// assert_eq!(store.get(boots), 1);
/// ```
///
/// [`flush`]: RecordStore::flush
/// [`load`]: RecordStore::load
pub struct RecordStore {
    layout: RecordLayout,
    save_delay: Duration,
    inner: ReentrantMutex<RefCell<StoreState>>,
}

impl RecordStore {
    /// Creates a store for `layout` on `backend`.
    ///
    /// The in-memory record starts out initialized (zero fields, valid
    /// header); call [`load`](Self::load) to pick up the saved image.
    pub fn new(layout: RecordLayout, backend: impl StorageBackend + 'static) -> Self {
        let mut buf = vec![0u8; layout.size()];
        layout.header().write(&mut buf);
        Self {
            layout,
            save_delay: Duration::ZERO,
            inner: ReentrantMutex::new(RefCell::new(StoreState {
                buf,
                backend: Box::new(backend),
                dirty_since: None,
            })),
        }
    }

    /// Creates a store for the layout of `schema`.
    pub fn with_schema(schema: &RecordSchema, backend: impl StorageBackend + 'static) -> Self {
        Self::new(schema.layout(), backend)
    }

    /// Sets how long changes may stay unsaved. Zero saves on every change.
    #[must_use]
    pub fn with_save_delay(mut self, delay: Duration) -> Self {
        self.save_delay = delay;
        self
    }

    /// Returns the record layout.
    #[must_use]
    pub fn layout(&self) -> RecordLayout {
        self.layout
    }

    /// Returns the configured save delay.
    #[must_use]
    pub fn save_delay(&self) -> Duration {
        self.save_delay
    }

    /// Loads the saved record, falling back to defaults.
    ///
    /// Reads up to the full record size from the backend and validates it.
    /// If the backend is empty, unreadable or holds a record that fails
    /// validation, the record is reinitialized. Always returns `true`.
    pub fn load(&self) -> bool {
        let guard = self.inner.lock();
        let mut state = guard.borrow_mut();
        let StoreState { buf, backend, .. } = &mut *state;

        let bytes_read = match backend.read_into(buf) {
            Ok(n) => n,
            Err(err) => {
                tracing::warn!(error = %err, "failed to read saved record");
                0
            }
        };

        if !validate_image(buf, &self.layout, bytes_read) {
            tracing::debug!(bytes_read, "saved record invalid or absent, using defaults");
            initialize_image(buf, &self.layout);
        }
        true
    }

    /// Validates the first `bytes_read` bytes of the in-memory record.
    ///
    /// Valid when at least a header was read, magic and version match, and
    /// the saved size does not exceed what was read. On success any bytes
    /// between `bytes_read` and the current record size are zeroed and the
    /// header size is updated to the current size, so records saved by
    /// firmware with fewer fields grow in place.
    pub fn validate(&self, bytes_read: usize) -> bool {
        let guard = self.inner.lock();
        let mut state = guard.borrow_mut();
        validate_image(&mut state.buf, &self.layout, bytes_read)
    }

    /// Resets the record to zero fields and a fresh header.
    pub fn initialize(&self) {
        let guard = self.inner.lock();
        let mut state = guard.borrow_mut();
        initialize_image(&mut state.buf, &self.layout);
    }

    /// Reads a scalar at `offset`, or the zero value if out of bounds.
    #[must_use]
    pub fn get_value<T: FieldValue>(&self, offset: usize) -> T {
        let Some(range) = self.field_range(offset, T::WIDTH) else {
            return T::default();
        };
        let guard = self.inner.lock();
        let state = guard.borrow();
        T::decode(&state.buf[range])
    }

    /// Writes a scalar at `offset`.
    ///
    /// Returns `false` without touching the record if the field would not
    /// fit or overlaps the header. Writing the value already stored is a
    /// no-op that does not trigger a save.
    pub fn set_value<T: FieldValue>(&self, offset: usize, value: T) -> bool {
        if offset < HEADER_SIZE {
            return false;
        }
        let Some(range) = self.field_range(offset, T::WIDTH) else {
            return false;
        };

        let mut encoded = [0u8; 8];
        value.encode(&mut encoded[..T::WIDTH]);

        let guard = self.inner.lock();
        let changed = {
            let mut state = guard.borrow_mut();
            let slot = &mut state.buf[range];
            if *slot == encoded[..T::WIDTH] {
                false
            } else {
                slot.copy_from_slice(&encoded[..T::WIDTH]);
                true
            }
        };
        if changed {
            self.save_or_defer();
        }
        true
    }

    /// Reads a NUL-terminated string from a `width`-byte field.
    ///
    /// Returns `None` if the field is out of bounds. Invalid UTF-8 is
    /// replaced rather than rejected.
    #[must_use]
    pub fn get_value_string(&self, offset: usize, width: usize) -> Option<String> {
        let range = self.field_range(offset, width)?;
        let guard = self.inner.lock();
        let state = guard.borrow();
        let field = &state.buf[range];
        let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        Some(String::from_utf8_lossy(&field[..end]).into_owned())
    }

    /// Writes a string into a `width`-byte field.
    ///
    /// The string must leave room for its terminator: anything of `width`
    /// bytes or more is rejected with `false` and the field keeps its old
    /// value. Strings containing NUL and out-of-bounds fields are rejected
    /// the same way. Nothing is ever truncated.
    pub fn set_value_string(&self, offset: usize, width: usize, value: &str) -> bool {
        if offset < HEADER_SIZE || value.len() >= width || value.contains('\0') {
            return false;
        }
        let Some(range) = self.field_range(offset, width) else {
            return false;
        };

        let guard = self.inner.lock();
        let changed = {
            let mut state = guard.borrow_mut();
            let field = &mut state.buf[range];
            let current_end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
            if &field[..current_end] == value.as_bytes() {
                false
            } else {
                field.fill(0);
                field[..value.len()].copy_from_slice(value.as_bytes());
                true
            }
        };
        if changed {
            self.save_or_defer();
        }
        true
    }

    /// Reads a schema field.
    #[must_use]
    pub fn get<T: FieldValue>(&self, field: Field<T>) -> T {
        self.get_value(field.offset())
    }

    /// Writes a schema field. See [`set_value`](Self::set_value).
    pub fn set<T: FieldValue>(&self, field: Field<T>, value: T) -> bool {
        self.set_value(field.offset(), value)
    }

    /// Reads a schema string field, empty if out of bounds.
    #[must_use]
    pub fn get_string(&self, field: StringField) -> String {
        self.get_value_string(field.offset, field.width)
            .unwrap_or_default()
    }

    /// Writes a schema string field. See
    /// [`set_value_string`](Self::set_value_string).
    pub fn set_string(&self, field: StringField, value: &str) -> bool {
        self.set_value_string(field.offset, field.width, value)
    }

    /// Persists now if the save delay is zero, otherwise marks the record
    /// dirty for a later [`flush`](Self::flush).
    pub fn save_or_defer(&self) {
        if self.save_delay.is_zero() {
            self.save();
        } else {
            let guard = self.inner.lock();
            let mut state = guard.borrow_mut();
            state.dirty_since.get_or_insert_with(Instant::now);
        }
    }

    /// Persists the record now.
    ///
    /// Returns `false` if the backend write failed; the record then stays
    /// dirty and the next [`flush`](Self::flush) retries.
    pub fn save(&self) -> bool {
        let guard = self.inner.lock();
        let mut state = guard.borrow_mut();
        let StoreState {
            buf,
            backend,
            dirty_since,
        } = &mut *state;

        match backend.write_all(buf) {
            Ok(()) => {
                *dirty_since = None;
                true
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to save record, will retry");
                dirty_since.get_or_insert_with(Instant::now);
                false
            }
        }
    }

    /// Persists deferred changes once the save delay has elapsed, or right
    /// away when `force` is set.
    ///
    /// Cheap when nothing is pending; meant to be called on every loop
    /// iteration, and with `force` before sleep or reset. Returns `false`
    /// only if a save was attempted and failed.
    pub fn flush(&self, force: bool) -> bool {
        let guard = self.inner.lock();
        let due = {
            let state = guard.borrow();
            match state.dirty_since {
                Some(since) => force || since.elapsed() >= self.save_delay,
                None => false,
            }
        };
        if due {
            self.save()
        } else {
            true
        }
    }

    /// Returns whether changes are waiting to be saved.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.inner.lock().borrow().dirty_since.is_some()
    }

    /// Returns a copy of the in-memory record image.
    #[must_use]
    pub fn bytes(&self) -> Vec<u8> {
        self.inner.lock().borrow().buf.clone()
    }

    /// Returns the in-memory record header.
    #[must_use]
    pub fn header(&self) -> RecordHeader {
        let guard = self.inner.lock();
        let state = guard.borrow();
        RecordHeader::read(&state.buf).unwrap_or_else(|| self.layout.header())
    }

    fn field_range(&self, offset: usize, width: usize) -> Option<std::ops::Range<usize>> {
        let end = offset.checked_add(width)?;
        (width > 0 && end <= self.layout.size()).then_some(offset..end)
    }
}

fn validate_image(buf: &mut [u8], layout: &RecordLayout, bytes_read: usize) -> bool {
    let bytes_read = bytes_read.min(buf.len());
    let Some(header) = RecordHeader::read(&buf[..bytes_read]) else {
        return false;
    };
    if header.magic != layout.magic()
        || header.version != layout.version()
        || usize::from(header.size) > bytes_read
    {
        return false;
    }

    buf[bytes_read..].fill(0);
    RecordHeader::write_size(buf, layout.header().size);
    true
}

fn initialize_image(buf: &mut [u8], layout: &RecordLayout) {
    buf.fill(0);
    layout.header().write(buf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordSchema;
    use std::sync::Arc;
    use wakekit_storage::{
        FileBackend, RetainedBackend, RetainedRegion, StorageError, StorageResult,
    };

    const MAGIC: u32 = 0x20a9_9e73;

    fn schema() -> RecordSchema {
        RecordSchema::builder(MAGIC, 1)
            .field::<i32>("test1")
            .field::<bool>("test2")
            .field::<f64>("test3")
            .string("test4", 10)
            .build()
            .unwrap()
    }

    fn retained_store(region: &RetainedRegion) -> RecordStore {
        RecordStore::with_schema(&schema(), RetainedBackend::new(region.clone()))
    }

    /// Backend whose writes can be switched off.
    struct FlakyBackend {
        inner: RetainedBackend,
        fail: Arc<parking_lot::Mutex<bool>>,
    }

    impl StorageBackend for FlakyBackend {
        fn read_into(&self, buf: &mut [u8]) -> StorageResult<usize> {
            self.inner.read_into(buf)
        }

        fn write_all(&mut self, data: &[u8]) -> StorageResult<()> {
            if *self.fail.lock() {
                return Err(StorageError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "flash busy",
                )));
            }
            self.inner.write_all(data)
        }

        fn size(&self) -> StorageResult<u64> {
            self.inner.size()
        }
    }

    #[test]
    fn load_empty_initializes() {
        let region = RetainedRegion::new();
        let store = retained_store(&region);
        assert!(store.load());

        let header = store.header();
        assert_eq!(header.magic, MAGIC);
        assert_eq!(header.version, 1);
        assert_eq!(header.size, 48);
        assert!(store.bytes()[HEADER_SIZE..].iter().all(|&b| b == 0));
    }

    #[test]
    fn round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temp02.dat");
        let schema = schema();
        let test1 = schema.field::<i32>("test1").unwrap();
        let test2 = schema.field::<bool>("test2").unwrap();
        let test3 = schema.field::<f64>("test3").unwrap();
        let test4 = schema.string_field("test4").unwrap();

        let store = RecordStore::with_schema(&schema, FileBackend::new(&path));
        store.load();
        store.save();

        store.set(test1, 0x55aa_55aa);
        assert_eq!(store.get(test1), 0x55aa_55aa);
        assert!(!store.get(test2));
        store.set(test2, true);
        assert_eq!(store.get(test3), 0.0);
        store.set(test3, 9_999_999.123_45);
        assert_eq!(store.get_string(test4), "");
        assert!(store.set_string(test4, "testing!"));
        assert!(store.set_string(test4, "testing1!"));
        assert!(!store.set_string(test4, "testing12!"));
        assert_eq!(store.get_string(test4), "testing1!");
        store.save();

        let reopened = RecordStore::with_schema(&schema, FileBackend::new(&path));
        reopened.load();
        assert_eq!(reopened.get(test1), 0x55aa_55aa);
        assert!(reopened.get(test2));
        assert_eq!(reopened.get(test3).to_bits(), 9_999_999.123_45_f64.to_bits());
        assert_eq!(reopened.get_string(test4), "testing1!");
        assert_eq!(reopened.bytes(), store.bytes());
    }

    #[test]
    fn wrong_magic_discarded() {
        let region = RetainedRegion::new();
        let store = retained_store(&region);
        store.load();
        store.set_value::<i32>(16, 42);

        let other = RecordStore::new(RecordLayout::new(0xdead_beef, 1, 48).unwrap(), RetainedBackend::new(region));
        other.load();
        assert_eq!(other.header().magic, 0xdead_beef);
        assert_eq!(other.get_value::<i32>(16), 0);
    }

    #[test]
    fn wrong_version_discarded() {
        let region = RetainedRegion::new();
        let store = retained_store(&region);
        store.load();
        store.set_value::<i32>(16, 42);

        let v2 = RecordStore::new(RecordLayout::new(MAGIC, 2, 48).unwrap(), RetainedBackend::new(region));
        v2.load();
        assert_eq!(v2.get_value::<i32>(16), 0);
        assert_eq!(v2.header().version, 2);
    }

    #[test]
    fn truncated_image_discarded() {
        let region = RetainedRegion::new();
        let store = retained_store(&region);
        store.load();
        store.set_value::<i32>(16, 42);

        // Header claims 48 bytes but only 20 survived
        let mut image = region.data();
        image.truncate(20);
        let damaged = RetainedRegion::with_data(image);
        let reloaded = retained_store(&damaged);
        reloaded.load();
        assert_eq!(reloaded.get_value::<i32>(16), 0);
    }

    #[test]
    fn shorter_record_grows_in_place() {
        let v1 = RecordSchema::builder(MAGIC, 1)
            .field::<i32>("test1")
            .build()
            .unwrap();
        let region = RetainedRegion::new();
        let old = RecordStore::with_schema(&v1, RetainedBackend::new(region.clone()));
        old.load();
        old.set_value::<i32>(16, 7);
        assert_eq!(region.data().len(), 20);

        let new = retained_store(&region);
        new.load();
        assert_eq!(new.get_value::<i32>(16), 7);
        assert_eq!(new.get_value::<f64>(24), 0.0);
        assert_eq!(new.header().size, 48);
        assert_eq!(new.bytes().len(), 48);
    }

    #[test]
    fn validate_pads_gap_with_zeros() {
        let store = retained_store(&RetainedRegion::new());
        store.load();
        store.set_value::<i32>(16, -1);

        // Pretend only the header was read: size says 48 so it fails
        assert!(!store.validate(HEADER_SIZE));
        assert!(!store.validate(HEADER_SIZE - 1));
        assert!(store.validate(48));
        assert_eq!(store.get_value::<i32>(16), -1);
    }

    #[test]
    fn validate_is_idempotent() {
        let region = RetainedRegion::new();
        let store = retained_store(&region);
        store.load();
        store.set_value::<f64>(24, 1.25);

        let before = store.bytes();
        assert!(store.validate(48));
        assert!(store.validate(48));
        assert_eq!(store.bytes(), before);

        let reloaded = retained_store(&region);
        reloaded.load();
        assert_eq!(reloaded.bytes(), before);
    }

    #[test]
    fn out_of_bounds_fails_closed() {
        let store = retained_store(&RetainedRegion::new());
        store.load();

        assert_eq!(store.get_value::<u64>(44), 0);
        assert!(!store.set_value::<u64>(44, 1));
        assert!(!store.set_value::<u8>(usize::MAX, 1));
        assert_eq!(store.get_value_string(40, 10), None);
        assert!(!store.set_value_string(40, 10, "x"));
        assert!(store.set_value::<u32>(44, 5));
    }

    #[test]
    fn header_is_read_only() {
        let store = retained_store(&RetainedRegion::new());
        store.load();
        assert!(!store.set_value::<u32>(0, 0));
        assert_eq!(store.get_value::<u32>(0), MAGIC);
    }

    #[test]
    fn unchanged_value_does_not_save() {
        let region = RetainedRegion::new();
        let store = retained_store(&region);
        store.load();
        store.set_value::<i32>(16, 5);
        region.clear();

        assert!(store.set_value::<i32>(16, 5));
        assert!(region.data().is_empty(), "no write for identical value");

        assert!(store.set_value::<i32>(16, 6));
        assert_eq!(region.data().len(), 48);
    }

    #[test]
    fn oversize_string_rejected_without_mutation() {
        let store = retained_store(&RetainedRegion::new());
        store.load();
        assert!(store.set_value_string(32, 10, "123456789"));
        assert!(!store.set_value_string(32, 10, "1234567890"));
        assert!(!store.set_value_string(32, 10, "nul\0byte"));
        assert_eq!(store.get_value_string(32, 10).unwrap(), "123456789");

        assert!(store.set_value_string(32, 10, "ab"));
        assert_eq!(&store.bytes()[32..42], b"ab\0\0\0\0\0\0\0\0");
    }

    #[test]
    fn deferred_save_waits_for_flush() {
        let region = RetainedRegion::new();
        let store = retained_store(&region).with_save_delay(Duration::from_secs(3600));
        store.load();

        store.set_value::<i32>(16, 1);
        assert!(store.is_dirty());
        assert!(region.data().is_empty());

        assert!(store.flush(false));
        assert!(region.data().is_empty(), "window not elapsed");

        assert!(store.flush(true));
        assert!(!store.is_dirty());
        assert_eq!(region.data().len(), 48);
    }

    #[test]
    fn deferred_save_after_window() {
        let region = RetainedRegion::new();
        let store = retained_store(&region).with_save_delay(Duration::from_millis(10));
        store.load();

        store.set_value::<i32>(16, 1);
        std::thread::sleep(Duration::from_millis(30));
        assert!(store.flush(false));
        assert!(!store.is_dirty());
        assert_eq!(region.data().len(), 48);
    }

    #[test]
    fn flush_without_changes_is_noop() {
        let region = RetainedRegion::new();
        let store = retained_store(&region);
        store.load();
        assert!(store.flush(true));
        assert!(region.data().is_empty());
    }

    #[test]
    fn failed_save_retried_on_flush() {
        let fail = Arc::new(parking_lot::Mutex::new(true));
        let region = RetainedRegion::new();
        let store = RecordStore::with_schema(
            &schema(),
            FlakyBackend {
                inner: RetainedBackend::new(region.clone()),
                fail: Arc::clone(&fail),
            },
        );
        store.load();

        assert!(store.set_value::<i32>(16, 99));
        assert!(store.is_dirty());
        assert_eq!(store.get_value::<i32>(16), 99, "memory stays authoritative");

        *fail.lock() = false;
        assert!(store.flush(false));
        assert!(!store.is_dirty());
        assert_eq!(region.data().len(), 48);
    }

    #[test]
    fn concurrent_setters() {
        let store = Arc::new(retained_store(&RetainedRegion::new()));
        store.load();

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for n in 0..100 {
                        store.set_value::<i32>(16, i * 1000 + n);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.get_value::<i32>(16) % 1000, 99);
    }
}
