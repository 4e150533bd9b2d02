//! Incremental JSON writer over a capped buffer.

use super::buffer::CappedBuffer;
use serde::Serialize;

#[derive(Debug, Clone, Copy)]
enum Scope {
    Object { first: bool, after_name: bool },
    Array { first: bool },
}

/// Builds JSON text by appending, one token at a time.
///
/// Commas and colons are inserted automatically. The writer sits on a
/// [`CappedBuffer`]: the first write that does not fit marks the output
/// truncated, and every later write is dropped. [`data_size`] keeps counting
/// what the full output would have needed, so callers can tell by how much
/// they missed.
///
/// Scalars go through `serde_json`, so strings are escaped and numbers
/// formatted exactly as `serde_json` would.
///
/// # Example
///
/// ```rust
/// use wakekit_core::json::JsonWriter;
///
/// let mut writer = JsonWriter::unbounded();
/// writer
///     .begin_object()
///     .key_value("a", &123)
///     .name("b")
///     .begin_array()
///     .value(&true)
///     .null_value()
///     .end_array()
///     .end_object();
/// assert_eq!(writer.as_str(), r#"{"a":123,"b":[true,null]}"#);
/// ```
///
/// [`data_size`]: JsonWriter::data_size
#[derive(Debug, Clone)]
pub struct JsonWriter {
    buf: CappedBuffer,
    scopes: Vec<Scope>,
    data_size: usize,
    truncated: bool,
}

impl Default for JsonWriter {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl JsonWriter {
    /// Creates a writer whose output may not exceed `capacity` bytes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self::over(CappedBuffer::new(capacity))
    }

    /// Creates a writer without a practical size limit.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::over(CappedBuffer::unbounded())
    }

    fn over(buf: CappedBuffer) -> Self {
        Self {
            buf,
            scopes: Vec::new(),
            data_size: 0,
            truncated: false,
        }
    }

    /// Opens an object.
    pub fn begin_object(&mut self) -> &mut Self {
        self.before_value();
        self.emit("{");
        self.scopes.push(Scope::Object {
            first: true,
            after_name: false,
        });
        self
    }

    /// Closes the innermost object.
    pub fn end_object(&mut self) -> &mut Self {
        self.scopes.pop();
        self.emit("}");
        self
    }

    /// Opens an array.
    pub fn begin_array(&mut self) -> &mut Self {
        self.before_value();
        self.emit("[");
        self.scopes.push(Scope::Array { first: true });
        self
    }

    /// Closes the innermost array.
    pub fn end_array(&mut self) -> &mut Self {
        self.scopes.pop();
        self.emit("]");
        self
    }

    /// Writes an object member name; the next value belongs to it.
    pub fn name(&mut self, key: &str) -> &mut Self {
        let needs_comma = match self.scopes.last_mut() {
            Some(Scope::Object { first, after_name }) => {
                let comma = !*first;
                *first = false;
                *after_name = true;
                comma
            }
            _ => false,
        };
        if needs_comma {
            self.emit(",");
        }
        self.emit_serialized(key);
        self.emit(":");
        self
    }

    /// Writes a scalar (or any serializable) value.
    pub fn value<T: Serialize + ?Sized>(&mut self, value: &T) -> &mut Self {
        self.before_value();
        self.emit_serialized(value);
        self
    }

    /// Writes `null`.
    pub fn null_value(&mut self) -> &mut Self {
        self.before_value();
        self.emit("null");
        self
    }

    /// Writes `"key":value`.
    pub fn key_value<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> &mut Self {
        self.name(key).value(value)
    }

    /// Returns whether any write has been dropped for lack of room.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Returns the size the complete output needs, stored or not.
    #[must_use]
    pub fn data_size(&self) -> usize {
        self.data_size
    }

    /// Returns the capacity of the underlying buffer.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// Returns the number of bytes actually stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns whether nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Returns whether every opened object and array has been closed.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Returns the text written so far.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.buf.as_str()
    }

    /// Consumes the writer, returning its text.
    #[must_use]
    pub fn into_string(self) -> String {
        self.buf.into_string()
    }

    fn before_value(&mut self) {
        let needs_comma = match self.scopes.last_mut() {
            Some(Scope::Object { after_name, .. }) if *after_name => {
                *after_name = false;
                false
            }
            Some(Scope::Object { first, .. }) | Some(Scope::Array { first }) => {
                let comma = !*first;
                *first = false;
                comma
            }
            None => false,
        };
        if needs_comma {
            self.emit(",");
        }
    }

    fn emit_serialized<T: Serialize + ?Sized>(&mut self, value: &T) {
        match serde_json::to_string(value) {
            Ok(text) => self.emit(&text),
            Err(err) => {
                tracing::debug!(error = %err, "value not representable as JSON, writing null");
                self.emit("null");
            }
        }
    }

    fn emit(&mut self, text: &str) {
        self.data_size += text.len();
        if !self.truncated && self.buf.try_push_str(text).is_err() {
            self.truncated = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object() {
        let mut writer = JsonWriter::unbounded();
        writer.begin_object().end_object();
        assert_eq!(writer.as_str(), "{}");
        assert!(writer.is_balanced());
    }

    #[test]
    fn nested_containers() {
        let mut writer = JsonWriter::unbounded();
        writer
            .begin_object()
            .name("outer")
            .begin_object()
            .key_value("x", &1)
            .key_value("y", "two")
            .end_object()
            .name("list")
            .begin_array()
            .begin_object()
            .end_object()
            .value(&1.5)
            .end_array()
            .end_object();
        assert_eq!(
            writer.as_str(),
            r#"{"outer":{"x":1,"y":"two"},"list":[{},1.5]}"#
        );
    }

    #[test]
    fn strings_are_escaped() {
        let mut writer = JsonWriter::unbounded();
        writer.begin_object().key_value("q\"k", "line\nbreak").end_object();
        assert_eq!(writer.as_str(), r#"{"q\"k":"line\nbreak"}"#);
    }

    #[test]
    fn truncation_drops_later_writes() {
        let mut writer = JsonWriter::new(8);
        writer.begin_object().key_value("a", "test123").end_object();

        assert!(writer.is_truncated());
        assert_eq!(writer.data_size(), r#"{"a":"test123"}"#.len());
        assert!(writer.len() <= 8);
    }

    #[test]
    fn exact_capacity_not_truncated() {
        let mut writer = JsonWriter::new(9);
        writer.begin_object().key_value("a", &123).end_object();
        assert!(!writer.is_truncated());
        assert_eq!(writer.as_str(), r#"{"a":123}"#);
    }

    #[test]
    fn top_level_array_commas() {
        let mut writer = JsonWriter::unbounded();
        writer.begin_array().value(&1).value(&2).null_value().end_array();
        assert_eq!(writer.into_string(), "[1,2,null]");
    }

    #[test]
    fn unbalanced_detected() {
        let mut writer = JsonWriter::unbounded();
        writer.begin_object().name("a").begin_array();
        assert!(!writer.is_balanced());
    }
}
