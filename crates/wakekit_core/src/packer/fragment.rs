//! Prioritized object bodies and the payload buffer they are packed into.

use crate::error::{CoreError, CoreResult};
use crate::json::{splice_value, CappedBuffer, JsonWriter};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// One candidate contribution to a payload.
///
/// A fragment is a JSON object without its braces (`"a":1,"b":true`),
/// together with the priority it was produced at and its top-level keys.
/// Duplicate keys in the source keep the last value.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    priority: i32,
    members: Map<String, Value>,
    body: String,
    history: bool,
}

impl Fragment {
    /// Parses a serialized JSON object.
    ///
    /// # Errors
    ///
    /// Returns an error if `text` is not valid JSON or not an object.
    pub fn parse(text: &str, priority: i32) -> CoreResult<Self> {
        match serde_json::from_str(text)? {
            Value::Object(members) => Ok(Self::from_members(members, priority)),
            _ => Err(CoreError::invalid_json("fragment is not an object")),
        }
    }

    /// Builds a fragment from already-parsed members.
    #[must_use]
    pub fn from_members(members: Map<String, Value>, priority: i32) -> Self {
        let body = render_body(&members);
        Self {
            priority,
            members,
            body,
            history: false,
        }
    }

    /// Marks the fragment as the event history reservation.
    pub(crate) fn into_history(mut self) -> Self {
        self.history = true;
        self
    }

    /// Returns whether this is the event history reservation.
    pub(crate) fn is_history(&self) -> bool {
        self.history
    }

    /// Returns the priority.
    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Returns the object body, without braces.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Returns the top-level keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    /// Returns whether the fragment has a top-level `key`.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.members.contains_key(key)
    }

    /// Returns whether the fragment has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Returns the fragment minus any member whose key is in `claimed`.
    ///
    /// `None` if nothing would be left.
    pub(crate) fn without_keys(&self, claimed: &HashSet<String>) -> Option<Self> {
        if !self.keys().any(|k| claimed.contains(k)) {
            return Some(self.clone());
        }
        let members: Map<String, Value> = self
            .members
            .iter()
            .filter(|(k, _)| !claimed.contains(k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if members.is_empty() {
            None
        } else {
            Some(Self {
                history: self.history,
                ..Self::from_members(members, self.priority)
            })
        }
    }
}

fn render_body(members: &Map<String, Value>) -> String {
    let mut writer = JsonWriter::unbounded();
    writer.begin_object();
    for (key, value) in members {
        writer.name(key);
        splice_value(value, &mut writer);
    }
    writer.end_object();

    let text = writer.into_string();
    text[1..text.len() - 1].to_string()
}

/// Accumulates fragment bodies into one `{...}` payload.
///
/// The closing brace is accounted for up front, so a payload never exceeds
/// the capacity it was created with.
#[derive(Debug)]
pub(crate) struct PayloadBuffer {
    buf: CappedBuffer,
}

impl PayloadBuffer {
    /// Creates an empty payload of at most `capacity` bytes.
    ///
    /// `capacity` must be at least 2.
    pub(crate) fn new(capacity: usize) -> Self {
        let mut buf = CappedBuffer::new(capacity.saturating_sub(1));
        // Room for "{" is guaranteed by the caller
        let _ = buf.try_push_str("{");
        Self { buf }
    }

    /// Returns whether no fragment has been added.
    pub(crate) fn is_empty(&self) -> bool {
        self.buf.len() <= 1
    }

    /// Appends `fragment` if it fits, with a separating comma if needed.
    pub(crate) fn try_add(&mut self, fragment: &Fragment) -> bool {
        let separator = usize::from(!self.is_empty());
        if self.buf.remaining() < separator + fragment.body().len() {
            return false;
        }
        if separator == 1 && self.buf.try_push(',').is_err() {
            return false;
        }
        self.buf.try_push_str(fragment.body()).is_ok()
    }

    /// Closes the payload.
    pub(crate) fn finish(self) -> String {
        let mut text = self.buf.into_string();
        text.push('}');
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_strips_braces() {
        let fragment = Fragment::parse(r#"{"a":123,"b":true}"#, 10).unwrap();
        assert_eq!(fragment.body(), r#""a":123,"b":true"#);
        assert_eq!(fragment.keys().collect::<Vec<_>>(), ["a", "b"]);
        assert_eq!(fragment.priority(), 10);
    }

    #[test]
    fn duplicate_keys_keep_last_value() {
        let fragment = Fragment::parse(r#"{"a":1,"b":2,"a":3}"#, 10).unwrap();
        assert_eq!(fragment.body(), r#""a":3,"b":2"#);
    }

    #[test]
    fn non_object_rejected() {
        assert!(Fragment::parse("[1]", 10).is_err());
        assert!(Fragment::parse("{", 10).is_err());
    }

    #[test]
    fn without_keys_partial_and_total() {
        let fragment = Fragment::parse(r#"{"a":1,"b":2}"#, 10).unwrap();
        let claimed: HashSet<String> = ["a".to_string()].into();
        let rest = fragment.without_keys(&claimed).unwrap();
        assert_eq!(rest.body(), r#""b":2"#);

        let claimed: HashSet<String> = ["a".to_string(), "b".to_string()].into();
        assert!(fragment.without_keys(&claimed).is_none());
    }

    #[test]
    fn payload_exact_fit() {
        // {"a":"test12"} is 14 bytes
        let fragment = Fragment::parse(r#"{"a":"test12"}"#, 10).unwrap();
        let mut payload = PayloadBuffer::new(14);
        assert!(payload.try_add(&fragment));
        assert_eq!(payload.finish(), r#"{"a":"test12"}"#);

        let bigger = Fragment::parse(r#"{"a":"test123"}"#, 10).unwrap();
        let mut payload = PayloadBuffer::new(14);
        assert!(!payload.try_add(&bigger));
        assert!(payload.is_empty());
    }

    #[test]
    fn payload_counts_separator() {
        let a = Fragment::parse(r#"{"a":123}"#, 10).unwrap();
        let b = Fragment::parse(r#"{"b":true}"#, 10).unwrap();

        let mut payload = PayloadBuffer::new(18);
        assert!(payload.try_add(&a));
        assert!(payload.try_add(&b));
        assert_eq!(payload.finish(), r#"{"a":123,"b":true}"#);

        let mut payload = PayloadBuffer::new(17);
        assert!(payload.try_add(&a));
        assert!(!payload.try_add(&b));
        assert_eq!(payload.finish(), r#"{"a":123}"#);
    }
}
