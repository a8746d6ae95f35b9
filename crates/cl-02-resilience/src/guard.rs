//! # Guarded Store Calls
//!
//! Every store call made by a service goes through [`ResilienceGuard`]:
//!
//! ```text
//!   caller ──> breaker.try_acquire(dep) ──None──> Degraded::ShortCircuited
//!                   │ permit
//!                   ▼
//!            timeout(call_timeout, fut) ──elapsed──> permit.fail(), Degraded::TimedOut
//!                   │
//!                   ├── Err(infra)  ──> permit.fail(), Degraded::Unavailable
//!                   ├── Err(domain) ──> permit.succeed(), Ok(Err(e))
//!                   └── Ok(v)       ──> permit.succeed(), Ok(Ok(v))
//! ```
//!
//! The future is built by the caller but not polled until the breaker lets
//! it through, so a short-circuited call never reaches the store. If the
//! caller itself is cancelled mid-call, the unsettled permit is dropped and
//! the breaker records the call as abandoned.
//!
//! Reads turn `Degraded` into a fallback value. Writes turn it into
//! `PlatformError::ServiceUnavailable` and are never silently dropped.

use crate::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerManager};
use platform_telemetry::{STORE_CALLS, STORE_CALL_DURATION};
use shared_types::{PlatformError, StoreError};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::warn;

/// Default per-call deadline.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct ResilienceConfig {
    pub call_timeout: Duration,
    pub breaker: CircuitBreakerConfig,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
            breaker: CircuitBreakerConfig::default(),
        }
    }
}

/// Why a guarded call produced no answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Degraded {
    #[error("circuit open")]
    ShortCircuited,
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
    #[error("{0}")]
    Unavailable(String),
}

/// Separates infrastructure failures from domain outcomes.
pub trait FailureKind {
    /// `true` when the error means the dependency is degraded.
    fn is_infrastructure(&self) -> bool;
}

impl FailureKind for StoreError {
    fn is_infrastructure(&self) -> bool {
        StoreError::is_infrastructure(self)
    }
}

impl FailureKind for PlatformError {
    fn is_infrastructure(&self) -> bool {
        matches!(self, PlatformError::ServiceUnavailable { .. })
    }
}

/// Breakers plus deadline applied to every store call.
#[derive(Clone)]
pub struct ResilienceGuard {
    breakers: Arc<CircuitBreakerManager>,
    call_timeout: Duration,
}

impl ResilienceGuard {
    #[must_use]
    pub fn new(config: ResilienceConfig) -> Self {
        Self {
            breakers: Arc::new(CircuitBreakerManager::new(config.breaker)),
            call_timeout: config.call_timeout,
        }
    }

    /// Share an existing breaker set, e.g. across services talking to the
    /// same dependencies.
    #[must_use]
    pub fn with_breakers(breakers: Arc<CircuitBreakerManager>, call_timeout: Duration) -> Self {
        Self {
            breakers,
            call_timeout,
        }
    }

    #[must_use]
    pub fn breakers(&self) -> &Arc<CircuitBreakerManager> {
        &self.breakers
    }

    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Run `fut` under the breaker for `dependency` and the call deadline.
    ///
    /// Domain errors come back as `Ok(Err(e))` and count as a healthy
    /// response.
    pub async fn execute<T, E, Fut>(
        &self,
        dependency: &str,
        fut: Fut,
    ) -> Result<Result<T, E>, Degraded>
    where
        Fut: Future<Output = Result<T, E>>,
        E: FailureKind + std::fmt::Display,
    {
        let Some(permit) = self.breakers.try_acquire(dependency) else {
            STORE_CALLS
                .with_label_values(&[dependency, "short_circuited"])
                .inc();
            return Err(Degraded::ShortCircuited);
        };

        let started = Instant::now();
        let outcome = tokio::time::timeout(self.call_timeout, fut).await;
        STORE_CALL_DURATION
            .with_label_values(&[dependency])
            .observe(started.elapsed().as_secs_f64());

        match outcome {
            Err(_) => {
                warn!(dependency, timeout_ms = self.call_timeout.as_millis() as u64, "Store call timed out");
                permit.fail();
                STORE_CALLS.with_label_values(&[dependency, "timeout"]).inc();
                Err(Degraded::TimedOut(self.call_timeout))
            }
            Ok(Err(e)) if e.is_infrastructure() => {
                warn!(dependency, error = %e, "Store call failed");
                permit.fail();
                STORE_CALLS.with_label_values(&[dependency, "failure"]).inc();
                Err(Degraded::Unavailable(e.to_string()))
            }
            Ok(result) => {
                permit.succeed();
                STORE_CALLS.with_label_values(&[dependency, "ok"]).inc();
                Ok(result)
            }
        }
    }

    /// Guarded write: a degraded dependency surfaces as `ServiceUnavailable`.
    pub async fn write<T, E, Fut>(&self, dependency: &str, fut: Fut) -> Result<T, PlatformError>
    where
        Fut: Future<Output = Result<T, E>>,
        E: FailureKind + std::fmt::Display + Into<PlatformError>,
    {
        match self.execute(dependency, fut).await {
            Ok(result) => result.map_err(Into::into),
            Err(degraded) => Err(PlatformError::ServiceUnavailable {
                dependency: dependency.to_string(),
                reason: degraded.to_string(),
            }),
        }
    }

    /// Guarded read: a degraded dependency yields `fallback()`.
    pub async fn read<T, E, Fut, F>(
        &self,
        dependency: &str,
        fut: Fut,
        fallback: F,
    ) -> Result<T, PlatformError>
    where
        Fut: Future<Output = Result<T, E>>,
        E: FailureKind + std::fmt::Display + Into<PlatformError>,
        F: FnOnce() -> T,
    {
        match self.execute(dependency, fut).await {
            Ok(result) => result.map_err(Into::into),
            Err(degraded) => {
                warn!(dependency, reason = %degraded, "Serving fallback for degraded read");
                Ok(fallback())
            }
        }
    }
}

impl Default for ResilienceGuard {
    fn default() -> Self {
        Self::new(ResilienceConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::CircuitState;
    use shared_types::AggregateKind;

    const DEP: &str = "userService";

    fn guard(threshold: u32, timeout: Duration) -> ResilienceGuard {
        ResilienceGuard::new(ResilienceConfig {
            call_timeout: timeout,
            breaker: CircuitBreakerConfig {
                failure_threshold: threshold,
                open_timeout: Duration::from_secs(60),
                ..CircuitBreakerConfig::default()
            },
        })
    }

    fn down() -> StoreError {
        StoreError::unavailable(AggregateKind::User, "connection refused")
    }

    #[tokio::test]
    async fn test_ok_passes_through() {
        let g = guard(3, Duration::from_secs(1));
        let v = g.write(DEP, async { Ok::<_, StoreError>(7) }).await.unwrap();
        assert_eq!(v, 7);
        assert_eq!(g.breakers().get_state(DEP), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_domain_error_does_not_trip_breaker() {
        let g = guard(1, Duration::from_secs(1));
        for _ in 0..3 {
            let err = g
                .write(DEP, async {
                    Err::<(), _>(StoreError::not_found(AggregateKind::User, "u1"))
                })
                .await
                .unwrap_err();
            assert!(matches!(err, PlatformError::NotFound { .. }));
        }
        assert_eq!(g.breakers().get_state(DEP), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_failures_open_circuit_and_short_circuit_writes() {
        let g = guard(2, Duration::from_secs(1));
        for _ in 0..2 {
            let err = g.write(DEP, async { Err::<(), _>(down()) }).await.unwrap_err();
            assert!(matches!(err, PlatformError::ServiceUnavailable { .. }));
        }
        assert_eq!(g.breakers().get_state(DEP), CircuitState::Open);

        let polled = std::sync::atomic::AtomicBool::new(false);
        let err = g
            .write(DEP, async {
                polled.store(true, std::sync::atomic::Ordering::SeqCst);
                Ok::<_, StoreError>(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::ServiceUnavailable { .. }));
        assert!(!polled.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_read_falls_back_when_open() {
        let g = guard(1, Duration::from_secs(1));
        g.breakers().force_open(DEP);
        let v: Vec<u32> = g
            .read(DEP, async { Ok::<_, StoreError>(vec![1, 2]) }, Vec::new)
            .await
            .unwrap();
        assert!(v.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let g = guard(1, Duration::from_millis(20));
        let out = g
            .execute(DEP, async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok::<_, StoreError>(())
            })
            .await;
        assert!(matches!(out, Err(Degraded::TimedOut(_))));
        assert_eq!(g.breakers().get_state(DEP), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_cancelled_half_open_call_does_not_wedge_circuit() {
        let g = ResilienceGuard::new(ResilienceConfig {
            call_timeout: Duration::from_secs(1),
            breaker: CircuitBreakerConfig {
                failure_threshold: 1,
                success_threshold: 1,
                open_timeout: Duration::from_millis(20),
                ..CircuitBreakerConfig::default()
            },
        });
        let _ = g.write(DEP, async { Err::<(), _>(down()) }).await;
        assert_eq!(g.breakers().get_state(DEP), CircuitState::Open);
        tokio::time::sleep(Duration::from_millis(40)).await;

        // The caller gives up on the half-open call before the store answers.
        let cancelled = tokio::time::timeout(
            Duration::from_millis(10),
            g.write(DEP, async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok::<_, StoreError>(())
            }),
        )
        .await;
        assert!(cancelled.is_err());
        assert_eq!(g.breakers().get_state(DEP), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(200)).await;
        let v = g.write(DEP, async { Ok::<_, StoreError>(9) }).await.unwrap();
        assert_eq!(v, 9);
        assert_eq!(g.breakers().get_state(DEP), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_dependencies_are_independent() {
        let g = guard(1, Duration::from_secs(1));
        g.breakers().force_open("groupService");
        let v = g.write(DEP, async { Ok::<_, StoreError>(1) }).await.unwrap();
        assert_eq!(v, 1);
    }
}
