//! Packs prioritized fragments and event history into bounded payloads.
//!
//! Every registered generator writes zero or more named fields into a
//! [`JsonWriter`] and sets a priority. One packing pass
//! ([`EventPacker::generate_events`]) turns those fields, plus whatever the
//! attached [`EventLog`] still holds, into as few JSON objects as fit the
//! size budget:
//!
//! 1. Render one-shot generators (newest first), then persistent ones
//!    (registration order). Output that is empty, truncated, malformed or at
//!    priority `<= 0` is discarded.
//! 2. Reserve a batch of log entries as one more fragment, under the
//!    history key at priority 1.
//! 3. Sort by priority, highest first, keeping registration order for ties.
//! 4. Drop keys already claimed by a higher fragment.
//! 5. Fill payloads greedily. Once one payload has been closed, low-priority
//!    fragments are not worth another payload and packing stops.
//! 6. Commit the log reservation if the history fragment made it in.
//! 7. Drain the remaining log into history-only payloads.
//! 8. Forget the one-shot generators.
//!
//! ## Invariants
//!
//! - No payload is longer than `max_size - PAYLOAD_RESERVE`
//! - No payload repeats a top-level key
//! - Log entries are removed only after they were placed in a payload

mod fragment;

pub use fragment::Fragment;

use crate::event_log::EventLog;
use crate::json::JsonWriter;
use fragment::PayloadBuffer;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Bytes of every budget kept free for the transport's own framing.
pub const PAYLOAD_RESERVE: usize = 2;

/// Once a payload has been closed, fragments below this priority stop
/// packing instead of opening another one.
pub const DEFAULT_NEW_PAYLOAD_MIN_PRIORITY: i32 = 50;

/// Highest priority a generator can claim.
pub const MAX_PRIORITY: i32 = 100;

/// Priority of the event history fragment.
pub const HISTORY_PRIORITY: i32 = 1;

/// Default key the event history is nested under.
pub const DEFAULT_HISTORY_KEY: &str = "eh";

/// `{"<key>":` plus closing brace plus the reserve.
const HISTORY_OVERHEAD: usize = 5 + PAYLOAD_RESERVE;

/// A field generator.
///
/// Writes members into an open object and sets the priority (initially 0).
/// A priority of zero or less excludes the output.
pub type FieldGenerator = Box<dyn FnMut(&mut JsonWriter, &mut i32) + Send>;

/// Combines generator output and event history into payloads.
///
/// # Example
///
/// ```rust
/// use wakekit_core::packer::EventPacker;
///
/// let mut packer = EventPacker::new();
/// packer.add_callback(|writer, priority| {
///     writer.key_value("battery", &87);
///     *priority = 60;
/// });
/// packer.add_one_shot(|writer, priority| {
///     writer.key_value("wr", &2);
///     *priority = 50;
/// });
///
/// assert_eq!(packer.generate_events(64), [r#"{"battery":87,"wr":2}"#]);
/// assert_eq!(packer.one_shot_count(), 0);
/// ```
pub struct EventPacker {
    callbacks: Vec<FieldGenerator>,
    one_shots: Vec<FieldGenerator>,
    event_log: Option<Arc<EventLog>>,
    history_key: String,
    new_payload_min_priority: i32,
}

impl Default for EventPacker {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventPacker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventPacker")
            .field("callbacks", &self.callbacks.len())
            .field("one_shots", &self.one_shots.len())
            .field("event_log", &self.event_log.as_ref().map(|log| log.path()))
            .field("history_key", &self.history_key)
            .field("new_payload_min_priority", &self.new_payload_min_priority)
            .finish()
    }
}

impl EventPacker {
    /// Creates a packer with no generators and no event log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            callbacks: Vec::new(),
            one_shots: Vec::new(),
            event_log: None,
            history_key: DEFAULT_HISTORY_KEY.to_string(),
            new_payload_min_priority: DEFAULT_NEW_PAYLOAD_MIN_PRIORITY,
        }
    }

    /// Attaches the log whose backlog is packed under the history key.
    #[must_use]
    pub fn with_event_log(mut self, log: Arc<EventLog>) -> Self {
        self.event_log = Some(log);
        self
    }

    /// Sets the key the event history is nested under.
    #[must_use]
    pub fn with_history_key(mut self, key: impl Into<String>) -> Self {
        self.history_key = key.into();
        self
    }

    /// Sets the priority below which packing stops once a payload is full.
    #[must_use]
    pub fn with_new_payload_min_priority(mut self, priority: i32) -> Self {
        self.new_payload_min_priority = priority;
        self
    }

    /// Returns the history key.
    #[must_use]
    pub fn history_key(&self) -> &str {
        &self.history_key
    }

    /// Registers a generator that runs on every pass.
    pub fn add_callback<F>(&mut self, generator: F)
    where
        F: FnMut(&mut JsonWriter, &mut i32) + Send + 'static,
    {
        self.callbacks.push(Box::new(generator));
    }

    /// Registers a generator for the next pass only.
    ///
    /// When several one-shots write the same key at the same priority, the
    /// most recently added wins.
    pub fn add_one_shot<F>(&mut self, generator: F)
    where
        F: FnMut(&mut JsonWriter, &mut i32) + Send + 'static,
    {
        self.one_shots.push(Box::new(generator));
    }

    /// Drops pending one-shot generators.
    pub fn clear_one_shots(&mut self) {
        self.one_shots.clear();
    }

    /// Returns the number of persistent generators.
    #[must_use]
    pub fn callback_count(&self) -> usize {
        self.callbacks.len()
    }

    /// Returns the number of pending one-shot generators.
    #[must_use]
    pub fn one_shot_count(&self) -> usize {
        self.one_shots.len()
    }

    /// Runs one packing pass and returns the payloads, in publish order.
    ///
    /// Every payload is at most `max_size - PAYLOAD_RESERVE` bytes. One-shot
    /// generators are cleared afterwards, whether or not their output made
    /// it into a payload.
    pub fn generate_events(&mut self, max_size: usize) -> Vec<String> {
        let capacity = max_size.saturating_sub(PAYLOAD_RESERVE);
        let mut payloads = Vec::new();

        if capacity >= 2 {
            let mut fragments = self.render_generators(max_size);
            let history = self.reserve_history(max_size);
            let reserved = history.is_some();
            fragments.extend(history);

            fragments.sort_by(|a, b| b.priority().cmp(&a.priority()));
            let fragments = dedup_keys(fragments);

            let history_packed = self.pack(&fragments, capacity, &mut payloads);
            if let Some(log) = &self.event_log {
                if reserved {
                    if history_packed {
                        log.remove_events();
                    } else {
                        log.release_events();
                    }
                }
            }

            self.drain_history(max_size, &mut payloads);
        } else {
            tracing::debug!(max_size, "payload budget too small to pack anything");
        }

        self.clear_one_shots();
        tracing::debug!(count = payloads.len(), max_size, "packing pass complete");
        payloads
    }

    fn render_generators(&mut self, max_size: usize) -> Vec<Fragment> {
        let mut fragments = Vec::new();
        for generator in self.one_shots.iter_mut().rev().chain(self.callbacks.iter_mut()) {
            if let Some(fragment) = render(generator, max_size) {
                fragments.push(fragment);
            }
        }
        fragments
    }

    fn history_budget(&self, max_size: usize) -> usize {
        max_size.saturating_sub(self.history_key.len() + HISTORY_OVERHEAD)
    }

    /// Reads a batch of backlog without removing it.
    fn reserve_history(&self, max_size: usize) -> Option<Fragment> {
        let log = self.event_log.as_ref()?;
        if !log.has_events() {
            return None;
        }

        let mut writer = JsonWriter::new(max_size);
        writer.begin_object().name(&self.history_key);
        if !log.get_events(&mut writer, self.history_budget(max_size), false) {
            return None;
        }
        writer.end_object();

        match Fragment::parse(writer.as_str(), HISTORY_PRIORITY) {
            Ok(fragment) => Some(fragment.into_history()),
            Err(err) => {
                tracing::warn!(error = %err, "event history did not render as an object");
                log.release_events();
                None
            }
        }
    }

    /// Greedy fill. Returns whether the history fragment was placed.
    fn pack(&self, fragments: &[Fragment], capacity: usize, payloads: &mut Vec<String>) -> bool {
        let mut current = PayloadBuffer::new(capacity);
        let mut closed_one = false;
        let mut history_packed = false;

        for fragment in fragments {
            let mut placed = current.try_add(fragment);
            if !placed {
                if !current.is_empty() {
                    let full = std::mem::replace(&mut current, PayloadBuffer::new(capacity));
                    payloads.push(full.finish());
                    closed_one = true;
                }
                if closed_one && fragment.priority() < self.new_payload_min_priority {
                    tracing::debug!(
                        priority = fragment.priority(),
                        "payload full, remaining fragments below threshold"
                    );
                    break;
                }
                placed = current.try_add(fragment);
                if !placed {
                    tracing::debug!(
                        len = fragment.body().len(),
                        capacity,
                        "fragment larger than an empty payload, dropped"
                    );
                }
            }
            if placed && fragment.is_history() {
                history_packed = true;
            }
        }

        if !current.is_empty() {
            payloads.push(current.finish());
        }
        history_packed
    }

    /// Emits `{"<key>":[...]}` payloads until the log is empty or stuck.
    fn drain_history(&self, max_size: usize, payloads: &mut Vec<String>) {
        let Some(log) = &self.event_log else {
            return;
        };
        let budget = self.history_budget(max_size);

        while log.has_events() {
            let mut writer = JsonWriter::new(max_size.saturating_sub(PAYLOAD_RESERVE));
            writer.begin_object().name(&self.history_key);
            if !log.get_events(&mut writer, budget, false) {
                break;
            }
            writer.end_object();

            if writer.is_truncated() {
                log.release_events();
                break;
            }
            payloads.push(writer.into_string());
            if !log.remove_events() {
                break;
            }
        }
    }
}

/// Runs one generator into a writer capped at `max_size`.
fn render(generator: &mut FieldGenerator, max_size: usize) -> Option<Fragment> {
    let mut writer = JsonWriter::new(max_size);
    let mut priority = 0;

    writer.begin_object();
    generator(&mut writer, &mut priority);
    writer.end_object();

    let priority = priority.min(MAX_PRIORITY);
    if priority <= 0 {
        return None;
    }
    if writer.is_truncated() {
        tracing::debug!(needed = writer.data_size(), max_size, "generator output truncated, dropped");
        return None;
    }
    if !writer.is_balanced() {
        tracing::debug!("generator left a container open, dropped");
        return None;
    }

    match Fragment::parse(writer.as_str(), priority) {
        Ok(fragment) if !fragment.is_empty() => Some(fragment),
        Ok(_) => None,
        Err(err) => {
            tracing::debug!(error = %err, "generator output is not an object, dropped");
            None
        }
    }
}

/// Removes keys already claimed by an earlier (higher-priority) fragment.
fn dedup_keys(fragments: Vec<Fragment>) -> Vec<Fragment> {
    let mut claimed = HashSet::new();
    let mut kept = Vec::with_capacity(fragments.len());

    for fragment in fragments {
        let Some(fragment) = fragment.without_keys(&claimed) else {
            tracing::debug!("fragment keys all claimed, dropped");
            continue;
        };
        claimed.extend(fragment.keys().map(str::to_string));
        kept.push(fragment);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn field<T>(packer: &mut EventPacker, key: &'static str, value: T, priority: i32)
    where
        T: serde::Serialize + Send + 'static,
    {
        packer.add_callback(move |writer, p| {
            writer.key_value(key, &value);
            *p = priority;
        });
    }

    #[test]
    fn empty_packer_produces_nothing() {
        let mut packer = EventPacker::new();
        assert!(packer.generate_events(1024).is_empty());
    }

    #[test]
    fn zero_priority_excluded() {
        let mut packer = EventPacker::new();
        field(&mut packer, "a", 1, 0);
        field(&mut packer, "b", 2, -5);
        assert!(packer.generate_events(1024).is_empty());
    }

    #[test]
    fn priority_clamped_to_max() {
        let mut packer = EventPacker::new();
        field(&mut packer, "low", 1, 99);
        field(&mut packer, "high", 2, 1000);
        // 1000 is clamped to 100, still ahead of 99
        assert_eq!(packer.generate_events(1024), [r#"{"high":2,"low":1}"#]);
    }

    #[test]
    fn empty_object_excluded() {
        let mut packer = EventPacker::new();
        packer.add_callback(|_, p| *p = 80);
        assert!(packer.generate_events(1024).is_empty());
    }

    #[test]
    fn higher_priority_first() {
        let mut packer = EventPacker::new();
        field(&mut packer, "a", 1, 10);
        field(&mut packer, "b", 2, 90);
        field(&mut packer, "c", 3, 50);
        assert_eq!(packer.generate_events(1024), [r#"{"b":2,"c":3,"a":1}"#]);
    }

    #[test]
    fn same_key_higher_priority_wins() {
        let mut packer = EventPacker::new();
        field(&mut packer, "a", "low", 10);
        field(&mut packer, "a", "high", 20);
        assert_eq!(packer.generate_events(1024), [r#"{"a":"high"}"#]);
    }

    #[test]
    fn partially_claimed_fragment_keeps_rest() {
        let mut packer = EventPacker::new();
        packer.add_callback(|writer, p| {
            writer.key_value("a", &1).key_value("b", &2);
            *p = 10;
        });
        field(&mut packer, "a", 100, 20);
        assert_eq!(packer.generate_events(1024), [r#"{"a":100,"b":2}"#]);
    }

    #[test]
    fn one_shots_cleared_after_pass() {
        let mut packer = EventPacker::new();
        packer.add_one_shot(|writer, p| {
            writer.key_value("wr", &4);
            *p = 50;
        });
        assert_eq!(packer.one_shot_count(), 1);
        assert_eq!(packer.generate_events(1024), [r#"{"wr":4}"#]);
        assert_eq!(packer.one_shot_count(), 0);
        assert!(packer.generate_events(1024).is_empty());
    }

    #[test]
    fn unbalanced_output_dropped() {
        let mut packer = EventPacker::new();
        packer.add_callback(|writer, p| {
            writer.name("x").begin_array();
            *p = 60;
        });
        field(&mut packer, "ok", true, 60);
        assert_eq!(packer.generate_events(1024), [r#"{"ok":true}"#]);
    }

    #[test]
    fn tiny_budget_produces_nothing() {
        let mut packer = EventPacker::new();
        field(&mut packer, "a", 1, 60);
        packer.add_one_shot(|_, _| {});
        assert!(packer.generate_events(3).is_empty());
        assert_eq!(packer.one_shot_count(), 0);
    }

    #[test]
    fn custom_threshold_allows_more_payloads() {
        let mut packer = EventPacker::new().with_new_payload_min_priority(5);
        field(&mut packer, "a", 123, 10);
        field(&mut packer, "b", true, 10);
        assert_eq!(packer.generate_events(18), [r#"{"a":123}"#, r#"{"b":true}"#]);
    }

    #[test]
    fn history_rides_along_with_fields() {
        let dir = tempdir().unwrap();
        let log = Arc::new(EventLog::new(&dir.path().join("events.log")));
        log.add_event(r#"{"t":1}"#);
        log.add_event(r#"{"t":2}"#);

        let mut packer = EventPacker::new().with_event_log(Arc::clone(&log));
        field(&mut packer, "bat", 90, 60);

        assert_eq!(
            packer.generate_events(1024),
            [r#"{"bat":90,"eh":[{"t":1},{"t":2}]}"#]
        );
        assert!(!log.has_events());
    }

    #[test]
    fn history_overflow_drained_separately() {
        let dir = tempdir().unwrap();
        let log = Arc::new(EventLog::new(&dir.path().join("events.log")));
        for ii in 0..3 {
            log.add_event_with(|w| {
                w.key_value("n", &ii);
            });
        }

        // Room for one entry per payload
        let mut packer = EventPacker::new().with_event_log(Arc::clone(&log));
        let payloads = packer.generate_events(20);
        assert_eq!(
            payloads,
            [
                r#"{"eh":[{"n":0}]}"#,
                r#"{"eh":[{"n":1}]}"#,
                r#"{"eh":[{"n":2}]}"#,
            ]
        );
        assert!(!log.has_events());
    }

    #[test]
    fn history_key_is_configurable() {
        let dir = tempdir().unwrap();
        let log = Arc::new(EventLog::new(&dir.path().join("events.log")));
        log.add_event(r#"{"x":true}"#);

        let mut packer = EventPacker::new()
            .with_event_log(Arc::clone(&log))
            .with_history_key("history");
        assert_eq!(packer.history_key(), "history");
        assert_eq!(packer.generate_events(64), [r#"{"history":[{"x":true}]}"#]);
    }

    #[test]
    fn history_not_removed_when_left_out() {
        let dir = tempdir().unwrap();
        let log = Arc::new(EventLog::new(&dir.path().join("events.log")));
        log.add_event(r#"{"t":1}"#);

        let mut packer = EventPacker::new().with_event_log(Arc::clone(&log));
        field(&mut packer, "eh", "claimed", 60);

        // The field claims "eh", so history goes out on its own afterwards
        assert_eq!(
            packer.generate_events(1024),
            [r#"{"eh":"claimed"}"#, r#"{"eh":[{"t":1}]}"#]
        );
        assert!(!log.has_events());
    }

    #[test]
    fn stuck_history_entry_left_in_log() {
        let dir = tempdir().unwrap();
        let log = Arc::new(EventLog::new(&dir.path().join("events.log")));
        log.add_event(r#"{"long":"this entry cannot fit the budget"}"#);

        let mut packer = EventPacker::new().with_event_log(Arc::clone(&log));
        field(&mut packer, "a", 1, 60);
        assert_eq!(packer.generate_events(24), [r#"{"a":1}"#]);
        assert!(log.has_events());
        assert_eq!(log.pending_offset(), None);
    }
}
