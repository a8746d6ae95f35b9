//! Fault injection for in-memory stores.
//!
//! Lets tests and simulations degrade a single dependency: fail every call,
//! fail only writes, fail the next N calls, or respond slowly.

use parking_lot::Mutex;
use shared_types::{AggregateKind, StoreError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// How a faulty store behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultMode {
    Healthy,
    /// Every affected call fails with `Unavailable`.
    Failing,
    /// Affected calls succeed after a delay.
    Slow(Duration),
}

/// Which calls a fault applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultScope {
    All,
    Reads,
    Writes,
}

/// Whether a call reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

#[derive(Debug)]
struct FaultState {
    mode: FaultMode,
    scope: FaultScope,
    /// Remaining faulty calls; `None` means until changed.
    remaining: Option<u32>,
}

/// Shared fault switch held by a store adapter.
#[derive(Debug)]
pub struct FaultInjector {
    kind: AggregateKind,
    state: Mutex<FaultState>,
    calls: AtomicU64,
}

impl FaultInjector {
    #[must_use]
    pub fn new(kind: AggregateKind) -> Self {
        Self {
            kind,
            state: Mutex::new(FaultState {
                mode: FaultMode::Healthy,
                scope: FaultScope::All,
                remaining: None,
            }),
            calls: AtomicU64::new(0),
        }
    }

    /// Apply `mode` to `scope` until changed.
    pub fn set(&self, mode: FaultMode, scope: FaultScope) {
        let mut state = self.state.lock();
        state.mode = mode;
        state.scope = scope;
        state.remaining = None;
    }

    /// Fail the next `n` calls in `scope`, then heal.
    pub fn fail_next(&self, n: u32, scope: FaultScope) {
        let mut state = self.state.lock();
        state.mode = FaultMode::Failing;
        state.scope = scope;
        state.remaining = Some(n);
    }

    pub fn heal(&self) {
        self.set(FaultMode::Healthy, FaultScope::All);
    }

    /// Total calls observed, faulty or not.
    #[must_use]
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Run before every store call.
    pub async fn before(&self, access: Access) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        let mode = {
            let mut state = self.state.lock();
            let in_scope = match (state.scope, access) {
                (FaultScope::All, _)
                | (FaultScope::Reads, Access::Read)
                | (FaultScope::Writes, Access::Write) => true,
                _ => false,
            };
            if !in_scope || state.mode == FaultMode::Healthy {
                return Ok(());
            }
            let mode = state.mode;
            if let Some(remaining) = state.remaining.as_mut() {
                *remaining = remaining.saturating_sub(1);
                if *remaining == 0 {
                    state.mode = FaultMode::Healthy;
                    state.remaining = None;
                }
            }
            mode
        };

        match mode {
            FaultMode::Healthy => Ok(()),
            FaultMode::Failing => Err(StoreError::unavailable(self.kind, "injected fault")),
            FaultMode::Slow(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }
}
