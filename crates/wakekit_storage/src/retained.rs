//! Retained-memory storage backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::sync::Arc;

/// A shared region of memory that outlives the stores using it.
///
/// On hardware this is battery-backed SRAM that keeps its contents through
/// sleep. Here it is a reference-counted buffer: clone the region, hand one
/// handle to a store, and a second store built later over the same region
/// sees whatever the first one saved, which is how a warm boot looks.
///
/// A region may have a fixed capacity, like a real retained-RAM block.
#[derive(Debug, Clone, Default)]
pub struct RetainedRegion {
    data: Arc<RwLock<Vec<u8>>>,
    capacity: Option<usize>,
}

impl RetainedRegion {
    /// Creates an empty region with no capacity limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty region holding at most `capacity` bytes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Arc::default(),
            capacity: Some(capacity),
        }
    }

    /// Creates a region with pre-existing contents.
    ///
    /// Useful for testing recovery from stale or corrupted images.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
            capacity: None,
        }
    }

    /// Returns a copy of the region contents.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }

    /// Clears the region, as a power loss would.
    pub fn clear(&self) {
        self.data.write().clear();
    }
}

/// A record backend over a [`RetainedRegion`].
///
/// # Example
///
/// ```rust
/// use wakekit_storage::{RetainedBackend, RetainedRegion, StorageBackend};
///
/// let region = RetainedRegion::with_capacity(64);
/// let mut backend = RetainedBackend::new(region.clone());
/// backend.write_all(b"test data").unwrap();
/// assert_eq!(region.data(), b"test data");
/// ```
#[derive(Debug, Clone)]
pub struct RetainedBackend {
    region: RetainedRegion,
}

impl RetainedBackend {
    /// Creates a backend over `region`.
    #[must_use]
    pub fn new(region: RetainedRegion) -> Self {
        Self { region }
    }

    /// Returns the underlying region.
    #[must_use]
    pub fn region(&self) -> &RetainedRegion {
        &self.region
    }
}

impl StorageBackend for RetainedBackend {
    fn read_into(&self, buf: &mut [u8]) -> StorageResult<usize> {
        let data = self.region.data.read();
        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);
        Ok(n)
    }

    fn write_all(&mut self, new_data: &[u8]) -> StorageResult<()> {
        if let Some(capacity) = self.region.capacity {
            if new_data.len() > capacity {
                return Err(StorageError::RecordTooLarge {
                    len: new_data.len(),
                    capacity,
                });
            }
        }

        let mut data = self.region.data.write();
        data.clear();
        data.extend_from_slice(new_data);
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.region.data.read().len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retained_new_is_empty() {
        let backend = RetainedBackend::new(RetainedRegion::new());
        assert_eq!(backend.size().unwrap(), 0);

        let mut buf = [0u8; 4];
        assert_eq!(backend.read_into(&mut buf).unwrap(), 0);
    }

    #[test]
    fn retained_write_visible_through_region() {
        let region = RetainedRegion::new();
        let mut backend = RetainedBackend::new(region.clone());

        backend.write_all(b"hello").unwrap();
        assert_eq!(region.data(), b"hello");

        backend.write_all(b"hi").unwrap();
        assert_eq!(region.data(), b"hi");
        assert_eq!(backend.size().unwrap(), 2);
    }

    #[test]
    fn retained_survives_backend_drop() {
        let region = RetainedRegion::new();
        {
            let mut backend = RetainedBackend::new(region.clone());
            backend.write_all(b"warm boot").unwrap();
        }

        let backend = RetainedBackend::new(region);
        let mut buf = [0u8; 16];
        let n = backend.read_into(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"warm boot");
    }

    #[test]
    fn retained_capacity_enforced() {
        let region = RetainedRegion::with_capacity(4);
        let mut backend = RetainedBackend::new(region.clone());

        backend.write_all(b"abcd").unwrap();
        let result = backend.write_all(b"abcde");
        assert!(matches!(
            result,
            Err(StorageError::RecordTooLarge { len: 5, capacity: 4 })
        ));
        assert_eq!(region.data(), b"abcd");
    }

    #[test]
    fn retained_with_data_and_clear() {
        let region = RetainedRegion::with_data(b"preloaded".to_vec());
        let backend = RetainedBackend::new(region.clone());
        assert_eq!(backend.size().unwrap(), 9);

        region.clear();
        assert_eq!(backend.size().unwrap(), 0);
    }

    #[test]
    fn retained_read_truncates_to_buffer() {
        let backend = RetainedBackend::new(RetainedRegion::with_data(b"abcdef".to_vec()));
        let mut buf = [0u8; 3];
        assert_eq!(backend.read_into(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"abc");
    }
}
