//! Context configuration.

use crate::event_log::DEFAULT_MAX_EVENT_SIZE;
use crate::packer::{DEFAULT_HISTORY_KEY, DEFAULT_NEW_PAYLOAD_MIN_PRIORITY};
use std::fmt;
use std::time::Duration;

/// Built-in wake events that can be attached to the next payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WakeEventKind {
    /// Why the device woke (`"wr"`).
    WakeReason,
    /// Milliseconds the last connection took (`"ttc"`).
    TimeToConnect,
    /// Why the device last reset (`"rr"`).
    ResetReason,
}

impl WakeEventKind {
    /// All kinds, in bit order.
    pub const ALL: [Self; 3] = [Self::WakeReason, Self::TimeToConnect, Self::ResetReason];

    /// Returns the payload key the event is written under.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::WakeReason => "wr",
            Self::TimeToConnect => "ttc",
            Self::ResetReason => "rr",
        }
    }

    /// Returns the priority the event is packed at.
    #[must_use]
    pub const fn priority(self) -> i32 {
        50
    }

    /// Looks a kind up by its payload key.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }

    const fn bit(self) -> u8 {
        match self {
            Self::WakeReason => 1,
            Self::TimeToConnect => 1 << 1,
            Self::ResetReason => 1 << 2,
        }
    }
}

impl fmt::Display for WakeEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Configuration for opening a [`WakeContext`](crate::WakeContext).
#[derive(Debug, Clone)]
pub struct Config {
    /// How long record changes may stay unsaved before `tick` writes them.
    pub save_delay: Duration,

    /// Key the event history is nested under in payloads.
    pub history_key: String,

    /// Size budget handed to the packer by `build_payloads`.
    pub max_payload_size: usize,

    /// Cap on a single event built with `EventLog::add_event_with`.
    pub max_event_size: usize,

    /// Once a payload is full, lower priorities stop packing.
    pub new_payload_min_priority: i32,

    wake_events: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            save_delay: Duration::from_secs(1),
            history_key: DEFAULT_HISTORY_KEY.to_string(),
            max_payload_size: 1024,
            max_event_size: DEFAULT_MAX_EVENT_SIZE,
            new_payload_min_priority: DEFAULT_NEW_PAYLOAD_MIN_PRIORITY,
            wake_events: 0b111,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the deferred-save delay.
    #[must_use]
    pub const fn save_delay(mut self, delay: Duration) -> Self {
        self.save_delay = delay;
        self
    }

    /// Sets the history key.
    #[must_use]
    pub fn history_key(mut self, key: impl Into<String>) -> Self {
        self.history_key = key.into();
        self
    }

    /// Sets the payload size budget.
    #[must_use]
    pub const fn max_payload_size(mut self, size: usize) -> Self {
        self.max_payload_size = size;
        self
    }

    /// Sets the single-event size cap.
    #[must_use]
    pub const fn max_event_size(mut self, size: usize) -> Self {
        self.max_event_size = size;
        self
    }

    /// Sets the new-payload priority threshold.
    #[must_use]
    pub const fn new_payload_min_priority(mut self, priority: i32) -> Self {
        self.new_payload_min_priority = priority;
        self
    }

    /// Enables or disables one built-in wake event.
    #[must_use]
    pub const fn wake_event(mut self, kind: WakeEventKind, enabled: bool) -> Self {
        if enabled {
            self.wake_events |= kind.bit();
        } else {
            self.wake_events &= !kind.bit();
        }
        self
    }

    /// Returns whether a built-in wake event is enabled.
    #[must_use]
    pub const fn is_wake_event_enabled(&self, kind: WakeEventKind) -> bool {
        self.wake_events & kind.bit() != 0
    }
}
