//! Storage backend trait definition.

use crate::error::StorageResult;

/// A low-level store for one saved record image.
///
/// Backends are **opaque byte stores**. The record store reads the whole
/// image at load time and replaces it wholesale on save; backends never see
/// individual fields.
///
/// # Invariants
///
/// - `read_into` returns the number of bytes copied, `0` when nothing has
///   been stored yet
/// - After `write_all` returns successfully, `read_into` observes exactly the
///   new image; a failed `write_all` leaves the previous image readable
/// - Backends must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::FileBackend`] - For flash file systems
/// - [`super::RetainedBackend`] - For battery-retained memory
pub trait StorageBackend: Send + Sync {
    /// Copies the stored image into `buf`, up to `buf.len()` bytes.
    ///
    /// Returns the number of bytes copied. An image longer than `buf` is
    /// truncated to `buf.len()`; a shorter one leaves the tail of `buf`
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs. A record that was never
    /// written is not an error.
    fn read_into(&self, buf: &mut [u8]) -> StorageResult<usize>;

    /// Replaces the stored image with `data`.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be written or does not fit.
    fn write_all(&mut self, data: &[u8]) -> StorageResult<()>;

    /// Returns the size of the stored image in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;
}
