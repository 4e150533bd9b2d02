//! Fixed-capacity text buffer.

use std::fmt;
use thiserror::Error;

/// Returned when an append would exceed a buffer's capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("append of {needed} bytes would overflow ({remaining} remaining)")]
pub struct WouldOverflow {
    /// Bytes the rejected append needed.
    pub needed: usize,
    /// Bytes that were still free.
    pub remaining: usize,
}

/// A string buffer that never grows past a fixed capacity.
///
/// Appends either land completely or not at all; an append that would not
/// fit returns [`WouldOverflow`] and leaves the contents unchanged.
///
/// # Example
///
/// ```rust
/// use wakekit_core::json::CappedBuffer;
///
/// let mut buf = CappedBuffer::new(4);
/// buf.try_push_str("abc").unwrap();
/// assert!(buf.try_push_str("de").is_err());
/// assert_eq!(buf.as_str(), "abc");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct CappedBuffer {
    text: String,
    capacity: usize,
}

impl CappedBuffer {
    /// Creates an empty buffer holding at most `capacity` bytes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            text: String::with_capacity(capacity.min(4096)),
            capacity,
        }
    }

    /// Creates a buffer with no practical capacity limit.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            text: String::new(),
            capacity: usize::MAX,
        }
    }

    /// Appends `s` if it fits.
    ///
    /// # Errors
    ///
    /// Returns [`WouldOverflow`] without modifying the buffer if `s` does not
    /// fit in the remaining capacity.
    pub fn try_push_str(&mut self, s: &str) -> Result<(), WouldOverflow> {
        if !self.would_fit(s.len()) {
            return Err(WouldOverflow {
                needed: s.len(),
                remaining: self.remaining(),
            });
        }
        self.text.push_str(s);
        Ok(())
    }

    /// Appends a single character if it fits.
    ///
    /// # Errors
    ///
    /// Returns [`WouldOverflow`] if the character does not fit.
    pub fn try_push(&mut self, ch: char) -> Result<(), WouldOverflow> {
        let mut tmp = [0u8; 4];
        self.try_push_str(ch.encode_utf8(&mut tmp))
    }

    /// Returns whether `len` more bytes would fit.
    #[must_use]
    pub fn would_fit(&self, len: usize) -> bool {
        len <= self.remaining()
    }

    /// Returns the number of free bytes.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.capacity - self.text.len()
    }

    /// Returns the capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of bytes stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Returns whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Returns the contents.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Empties the buffer, keeping its capacity.
    pub fn clear(&mut self) {
        self.text.clear();
    }

    /// Consumes the buffer, returning its contents.
    #[must_use]
    pub fn into_string(self) -> String {
        self.text
    }
}

impl fmt::Debug for CappedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CappedBuffer")
            .field("len", &self.text.len())
            .field("capacity", &self.capacity)
            .field("text", &self.text)
            .finish()
    }
}
