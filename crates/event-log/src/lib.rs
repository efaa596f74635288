//! Bounded, deduplicated, newest-first security event log.
//!
//! Events arrive from two sources with no ordering guarantee between them:
//! the authority's event endpoint (authoritative for what the server already
//! knows) and locally synthesized arrivals/departures/edges (low-latency
//! feedback before the server confirms). The same physical event therefore
//! can show up twice (once synthesized, once confirmed) and the merge
//! collapses the pair: same action and device, timestamps within the dedup
//! window.

use chrono::Duration;
use guard_protocol_types::SecurityEvent;
use std::collections::VecDeque;
use tracing::trace;

/// Default number of retained events.
pub const DEFAULT_CAPACITY: usize = 150;

/// Default window within which a local and a remote copy of one physical
/// event are considered the same.
pub const DEFAULT_DEDUP_WINDOW_SECS: i64 = 2;

/// Append-only bounded event sequence, newest first.
#[derive(Debug)]
pub struct EventLog {
    entries: VecDeque<SecurityEvent>,
    capacity: usize,
    dedup_window: Duration,
}

impl EventLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            dedup_window: Duration::seconds(DEFAULT_DEDUP_WINDOW_SECS),
        }
    }

    /// Record a locally synthesized event. Returns false when it was
    /// suppressed as a duplicate.
    pub fn record_local(&mut self, event: SecurityEvent) -> bool {
        self.insert(event)
    }

    /// Merge a batch reported by the authority, preserving its order at the
    /// front of the log. Returns how many entries were actually inserted.
    pub fn merge_remote(&mut self, events: Vec<SecurityEvent>) -> usize {
        let mut inserted = 0;
        // Reverse so the batch's own newest-first order survives the
        // front-insertion.
        for event in events.into_iter().rev() {
            if self.insert(event) {
                inserted += 1;
            }
        }
        inserted
    }

    fn insert(&mut self, event: SecurityEvent) -> bool {
        if self.is_duplicate(&event) {
            trace!(action = %event.action, "Suppressed duplicate event");
            return false;
        }
        self.entries.push_front(event);
        while self.entries.len() > self.capacity {
            self.entries.pop_back();
        }
        true
    }

    fn is_duplicate(&self, candidate: &SecurityEvent) -> bool {
        self.entries.iter().any(|existing| {
            existing.action == candidate.action
                && existing.device == candidate.device
                && (existing.timestamp - candidate.timestamp).abs() <= self.dedup_window
        })
    }

    /// Newest-first iteration.
    pub fn iter(&self) -> impl Iterator<Item = &SecurityEvent> {
        self.entries.iter()
    }

    /// Cloned newest-first view for snapshots.
    pub fn to_vec(&self) -> Vec<SecurityEvent> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}
