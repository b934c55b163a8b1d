//! # Pending-Emit Queue
//!
//! Outbound events attempted while the link is down. This is a best-effort
//! buffer, not an outbox: by default one entry per event name is kept and a
//! later emit overwrites the payload in place (its slot in the flush order is
//! the one of the first enqueue). Event names listed as lossless are instead
//! appended individually, up to a per-name cap, dropping the oldest.

use std::collections::HashSet;

use serde_json::Value;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub struct PendingEmit {
    pub event: String,
    pub payload: Value,
    pub enqueued_at: Instant,
}

/// What [`PendingEmitQueue::enqueue`] did with the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    Added,
    /// A pending payload for the same event name was overwritten.
    Replaced,
    /// Lossless event at its cap: the oldest entry of that name was dropped.
    Evicted,
}

#[derive(Debug, Default)]
pub struct PendingEmitQueue {
    entries: Vec<PendingEmit>,
    lossless: HashSet<String>,
    max_per_event: usize,
}

impl PendingEmitQueue {
    pub fn new(lossless: HashSet<String>, max_per_event: usize) -> Self {
        Self { entries: Vec::new(), lossless, max_per_event: max_per_event.max(1) }
    }

    pub fn enqueue(&mut self, event: &str, payload: Value) -> Enqueued {
        let now = Instant::now();

        if self.lossless.contains(event) {
            let mut outcome = Enqueued::Added;
            let same_name = self.entries.iter().filter(|e| e.event == event).count();
            if same_name >= self.max_per_event {
                if let Some(oldest) = self.entries.iter().position(|e| e.event == event) {
                    self.entries.remove(oldest);
                    outcome = Enqueued::Evicted;
                }
            }
            self.entries.push(PendingEmit { event: event.to_string(), payload, enqueued_at: now });
            return outcome;
        }

        match self.entries.iter_mut().find(|e| e.event == event) {
            Some(existing) => {
                existing.payload = payload;
                existing.enqueued_at = now;
                Enqueued::Replaced
            }
            None => {
                self.entries.push(PendingEmit { event: event.to_string(), payload, enqueued_at: now });
                Enqueued::Added
            }
        }
    }

    /// Removes and returns every entry, in flush order.
    pub fn drain(&mut self) -> Vec<PendingEmit> {
        std::mem::take(&mut self.entries)
    }

    pub fn clear(&mut self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        dropped
    }

    pub fn get(&self, event: &str) -> Option<&PendingEmit> {
        self.entries.iter().rev().find(|e| e.event == event)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
