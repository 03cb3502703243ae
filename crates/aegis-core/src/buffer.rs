//! Bounded, age-evicting buffer of recent events.
//!
//! The buffer backs windowed threshold rules: detection counts matching
//! entries inside a rule's time window, then eviction drops anything older
//! than the configured maximum age. Windowed counting scans the buffer, so
//! each rule evaluation is O(buffer length); acceptable at the event volumes
//! this engine targets.

use crate::event::SecurityEvent;
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

/// Retention configuration for the event buffer.
#[derive(Debug, Clone)]
pub struct BufferConfig {
    /// Maximum age of a retained event.
    pub max_age: Duration,
    /// Hard cap on retained events, oldest dropped first.
    pub max_len: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            max_age: Duration::hours(1),
            max_len: 100_000,
        }
    }
}

/// Bounded store of recent events, ordered by arrival.
///
/// Not internally synchronized; the detection engine guards it with a
/// single-writer lock.
#[derive(Debug)]
pub struct EventBuffer {
    config: BufferConfig,
    events: VecDeque<SecurityEvent>,
}

impl EventBuffer {
    /// Creates an empty buffer with the given retention config.
    pub fn new(config: BufferConfig) -> Self {
        Self {
            config,
            events: VecDeque::new(),
        }
    }

    /// Appends an event. Enforces the length cap immediately; age-based
    /// eviction happens in [`evict_expired`](Self::evict_expired).
    pub fn push(&mut self, event: SecurityEvent) {
        if self.events.len() == self.config.max_len {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Drops every event older than `max_age` relative to `now`.
    /// Returns the number of evicted entries. Idempotent: a second pass with
    /// the same `now` and no intervening pushes removes nothing.
    pub fn evict_expired(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.config.max_age;
        let before = self.events.len();
        // Arrival order is not guaranteed to be timestamp order, so filter
        // rather than popping from the front.
        self.events.retain(|e| e.timestamp >= cutoff);
        before - self.events.len()
    }

    /// Returns the events whose timestamps fall within `window` of `now`.
    pub fn window(&self, now: DateTime<Utc>, window: Duration) -> Vec<&SecurityEvent> {
        let cutoff = now - window;
        self.events.iter().filter(|e| e.timestamp >= cutoff).collect()
    }

    /// Clones the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<SecurityEvent> {
        self.events.iter().cloned().collect()
    }

    /// Number of retained events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
