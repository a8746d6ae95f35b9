//! # Time Source
//!
//! Abstracted wall clock so that contest status derivation, intent ages and
//! cache expiry can be tested with deterministic time.

use std::sync::atomic::{AtomicU64, Ordering};

/// Timestamp in milliseconds since UNIX epoch.
pub type Timestamp = u64;

/// One minute in milliseconds.
pub const MINUTE_MS: u64 = 60_000;

/// Source of the current wall-clock time.
pub trait TimeSource: Send + Sync {
    /// Returns the current timestamp in milliseconds.
    fn now(&self) -> Timestamp;
}

/// Default system time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as Timestamp
    }
}

/// Manually driven clock for tests and simulations.
#[derive(Debug, Default)]
pub struct ManualTimeSource {
    now: AtomicU64,
}

impl ManualTimeSource {
    /// Create a clock frozen at `start`.
    #[must_use]
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    /// Jump to an absolute time.
    pub fn set(&self, now: Timestamp) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Move the clock forward.
    pub fn advance(&self, millis: u64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualTimeSource::new(1_000);
        clock.advance(MINUTE_MS);
        assert_eq!(clock.now(), 61_000);
        clock.set(5);
        assert_eq!(clock.now(), 5);
    }

    #[test]
    fn test_system_clock_is_after_2020() {
        assert!(SystemTimeSource.now() > 1_577_836_800_000);
    }
}
