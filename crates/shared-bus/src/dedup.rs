//! # Time-Bounded Event Deduplication
//!
//! Delivery is at-least-once, so consumers remember the event ids they have
//! handled for a bounded window and drop redeliveries.
//!
//! - Event ids are remembered for `window_ms` after their publish time.
//! - Envelopes published before the window cannot be checked and are
//!   rejected as expired.
//! - Expired ids are garbage-collected every `gc_interval_ms`.

use shared_types::Timestamp;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

/// Reasons an envelope is not handed to the consumer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DedupError {
    /// The event id was already handled.
    #[error("Event {event_id} already handled")]
    Duplicate { event_id: Uuid },

    /// The envelope is older than the dedup window.
    #[error("Event published at {published_at} is older than window start {threshold}")]
    Expired {
        published_at: Timestamp,
        threshold: Timestamp,
    },
}

/// Time-bounded set of handled event ids.
pub struct TimeBoundedDedupCache {
    /// Map of event id -> publish time.
    seen: HashMap<Uuid, Timestamp>,
    window_ms: u64,
    last_gc: Timestamp,
    gc_interval_ms: u64,
}

impl TimeBoundedDedupCache {
    /// Default window: 10 minutes.
    pub const DEFAULT_WINDOW_MS: u64 = 10 * 60_000;

    /// Default garbage collection interval.
    pub const DEFAULT_GC_INTERVAL_MS: u64 = 30_000;

    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Self::DEFAULT_WINDOW_MS, Self::DEFAULT_GC_INTERVAL_MS)
    }

    #[must_use]
    pub fn with_config(window_ms: u64, gc_interval_ms: u64) -> Self {
        Self {
            seen: HashMap::new(),
            window_ms,
            last_gc: 0,
            gc_interval_ms,
        }
    }

    /// Check an envelope and remember its id.
    ///
    /// The age check runs first so that the set stays bounded.
    pub fn check_and_record(
        &mut self,
        event_id: Uuid,
        published_at: Timestamp,
        now: Timestamp,
    ) -> Result<(), DedupError> {
        let threshold = now.saturating_sub(self.window_ms);
        if published_at < threshold {
            return Err(DedupError::Expired {
                published_at,
                threshold,
            });
        }

        if now.saturating_sub(self.last_gc) > self.gc_interval_ms {
            self.garbage_collect(threshold);
            self.last_gc = now;
        }

        if self.seen.contains_key(&event_id) {
            return Err(DedupError::Duplicate { event_id });
        }

        self.seen.insert(event_id, published_at);
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, event_id: &Uuid) -> bool {
        self.seen.contains_key(event_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn garbage_collect(&mut self, threshold: Timestamp) {
        self.seen.retain(|_, &mut ts| ts >= threshold);
    }
}

impl Default for TimeBoundedDedupCache {
    fn default() -> Self {
        Self::new()
    }
}
