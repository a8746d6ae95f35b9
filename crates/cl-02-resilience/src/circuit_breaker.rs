//! Per-dependency circuit breakers.
//!
//! One circuit per downstream dependency name (e.g. `contestService`),
//! independent of which aggregate id a call touches.
//!
//! # Circuit Breaker States
//!
//! ```text
//!                    success (x success_threshold)
//!            ┌────────────────────────────────────────────┐
//!            ▼                                            │
//!      ┌──────────┐  failures in window  ┌──────────┐  open_timeout  ┌───────────┐
//!      │  CLOSED  │ ───────────────────► │   OPEN   │ ─────────────► │ HALF-OPEN │
//!      │ (normal) │                      │ (reject) │                │  (probe)  │
//!      └──────────┘                      └──────────┘ ◄───────────── └───────────┘
//!                                                        any failure
//! ```
//!
//! # Configuration
//!
//! - `failure_threshold`: failures within `failure_window` that open the circuit (default: 5)
//! - `success_threshold`: probe successes in half-open before closing (default: 3)
//! - `open_timeout`: time before open becomes half-open (default: 30s)
//! - `half_open_max_calls`: concurrent probes allowed in half-open (default: 1)
//!
//! # Permits
//!
//! Callers take a [`CallPermit`] and settle it with the call's outcome. A
//! permit dropped unsettled (the caller's future was cancelled mid-call)
//! gives its half-open slot back by reopening the circuit, so a cancelled
//! probe can never leave the dependency half-open with no slot free.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use platform_telemetry::CIRCUIT_TRANSITIONS;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    /// Normal operation - calls pass through
    Closed,
    /// Calls are short-circuited to a fallback
    Open,
    /// Limited trial calls decide whether to close again
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub open_timeout: Duration,
    /// Only failures this recent count towards `failure_threshold`.
    pub failure_window: Duration,
    pub half_open_max_calls: u32,
    pub enabled: bool,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            open_timeout: Duration::from_secs(30),
            failure_window: Duration::from_secs(60),
            half_open_max_calls: 1,
            enabled: true,
        }
    }
}

struct DependencyCircuit {
    state: CircuitState,
    /// Failure instants inside the rolling window (closed state only).
    recent_failures: VecDeque<Instant>,
    half_open_successes: u32,
    half_open_in_flight: u32,
    opened_at: Option<Instant>,
    last_transition: Instant,
    total_requests: u64,
    total_failures: u64,
    total_rejected: u64,
}

impl DependencyCircuit {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            recent_failures: VecDeque::new(),
            half_open_successes: 0,
            half_open_in_flight: 0,
            opened_at: None,
            last_transition: Instant::now(),
            total_requests: 0,
            total_failures: 0,
            total_rejected: 0,
        }
    }

    fn transition(&mut self, dependency: &str, to: CircuitState) {
        self.state = to;
        self.last_transition = Instant::now();
        self.half_open_successes = 0;
        self.half_open_in_flight = 0;
        match to {
            CircuitState::Open => self.opened_at = Some(Instant::now()),
            CircuitState::Closed => {
                self.opened_at = None;
                self.recent_failures.clear();
            }
            CircuitState::HalfOpen => {}
        }
        CIRCUIT_TRANSITIONS
            .with_label_values(&[dependency, &to.to_string()])
            .inc();
    }

    fn prune(&mut self, window: Duration) {
        let now = Instant::now();
        while let Some(oldest) = self.recent_failures.front() {
            if now.duration_since(*oldest) > window {
                self.recent_failures.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Circuit breaker manager for all dependencies.
///
/// Safe under concurrent `should_allow` / `record_*` calls from any number
/// of workers.
pub struct CircuitBreakerManager {
    circuits: RwLock<HashMap<String, DependencyCircuit>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreakerManager {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            circuits: RwLock::new(HashMap::new()),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Admit one call to `dependency`, or `None` when the circuit rejects it.
    pub fn try_acquire<'a>(&'a self, dependency: &'a str) -> Option<CallPermit<'a>> {
        self.should_allow(dependency).then_some(CallPermit {
            manager: self,
            dependency,
            settled: false,
        })
    }

    /// Every `true` must be followed by exactly one `record_success`,
    /// `record_failure` or `record_abandoned`.
    fn should_allow(&self, dependency: &str) -> bool {
        if !self.config.enabled {
            return true;
        }

        let mut circuits = self.circuits.write();
        let circuit = circuits
            .entry(dependency.to_string())
            .or_insert_with(DependencyCircuit::new);

        circuit.total_requests += 1;

        if circuit.state == CircuitState::Open {
            let elapsed = circuit.opened_at.map(|t| t.elapsed());
            match elapsed {
                Some(elapsed) if elapsed < self.config.open_timeout => {
                    debug!(
                        dependency,
                        remaining_ms = (self.config.open_timeout - elapsed).as_millis() as u64,
                        "Circuit breaker is open, rejecting call"
                    );
                    circuit.total_rejected += 1;
                    return false;
                }
                _ => {
                    info!(dependency, "Circuit breaker transitioning to half-open");
                    circuit.transition(dependency, CircuitState::HalfOpen);
                }
            }
        }

        if circuit.state == CircuitState::HalfOpen {
            if circuit.half_open_in_flight >= self.config.half_open_max_calls {
                circuit.total_rejected += 1;
                return false;
            }
            circuit.half_open_in_flight += 1;
        }

        true
    }

    /// Record a successful call (the dependency responded).
    fn record_success(&self, dependency: &str) {
        if !self.config.enabled {
            return;
        }

        let mut circuits = self.circuits.write();
        let Some(circuit) = circuits.get_mut(dependency) else {
            return;
        };

        match circuit.state {
            CircuitState::Closed => circuit.recent_failures.clear(),
            CircuitState::HalfOpen => {
                circuit.half_open_in_flight = circuit.half_open_in_flight.saturating_sub(1);
                circuit.half_open_successes += 1;
                if circuit.half_open_successes >= self.config.success_threshold {
                    info!(
                        dependency,
                        successes = circuit.half_open_successes,
                        "Circuit breaker closing after successful probes"
                    );
                    circuit.transition(dependency, CircuitState::Closed);
                }
            }
            // A call admitted before the circuit opened.
            CircuitState::Open => {}
        }
    }

    /// Record a failed call (error reaching the dependency, or timeout).
    fn record_failure(&self, dependency: &str) {
        if !self.config.enabled {
            return;
        }

        let mut circuits = self.circuits.write();
        let circuit = circuits
            .entry(dependency.to_string())
            .or_insert_with(DependencyCircuit::new);

        circuit.total_failures += 1;

        match circuit.state {
            CircuitState::Closed => {
                circuit.recent_failures.push_back(Instant::now());
                circuit.prune(self.config.failure_window);
                let failures = circuit.recent_failures.len() as u32;
                if failures >= self.config.failure_threshold {
                    warn!(
                        dependency,
                        failures,
                        threshold = self.config.failure_threshold,
                        timeout_secs = self.config.open_timeout.as_secs(),
                        "Circuit breaker opening due to failures"
                    );
                    circuit.transition(dependency, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                warn!(dependency, "Circuit breaker reopening after probe failure");
                circuit.transition(dependency, CircuitState::Open);
            }
            CircuitState::Open => {
                circuit.opened_at = Some(Instant::now());
            }
        }
    }

    /// Record a call whose caller went away before it finished.
    ///
    /// Says nothing about a closed dependency. A half-open probe that never
    /// reported proves nothing either, so the circuit reopens and the next
    /// probe is admitted after `open_timeout`.
    fn record_abandoned(&self, dependency: &str) {
        if !self.config.enabled {
            return;
        }

        let mut circuits = self.circuits.write();
        let Some(circuit) = circuits.get_mut(dependency) else {
            return;
        };
        if circuit.state == CircuitState::HalfOpen {
            warn!(dependency, "Half-open probe abandoned, reopening circuit");
            circuit.transition(dependency, CircuitState::Open);
        }
    }

    /// Current state of a dependency's circuit.
    pub fn get_state(&self, dependency: &str) -> CircuitState {
        self.circuits
            .read()
            .get(dependency)
            .map(|c| c.state)
            .unwrap_or(CircuitState::Closed)
    }

    /// Force a circuit open (operator action, drills, tests).
    pub fn force_open(&self, dependency: &str) {
        let mut circuits = self.circuits.write();
        let circuit = circuits
            .entry(dependency.to_string())
            .or_insert_with(DependencyCircuit::new);
        warn!(dependency, "Circuit breaker forced open");
        circuit.transition(dependency, CircuitState::Open);
    }

    /// Statistics for all circuits.
    pub fn get_stats(&self) -> Vec<CircuitStats> {
        let circuits = self.circuits.read();
        let mut stats: Vec<CircuitStats> = circuits
            .iter()
            .map(|(dependency, circuit)| CircuitStats {
                dependency: dependency.clone(),
                state: circuit.state,
                recent_failures: circuit.recent_failures.len() as u32,
                total_requests: circuit.total_requests,
                total_failures: circuit.total_failures,
                total_rejected: circuit.total_rejected,
                time_in_state_ms: circuit.last_transition.elapsed().as_millis() as u64,
            })
            .collect();
        stats.sort_by(|a, b| a.dependency.cmp(&b.dependency));
        stats
    }

    /// Close a specific circuit.
    pub fn reset(&self, dependency: &str) {
        let mut circuits = self.circuits.write();
        if let Some(circuit) = circuits.get_mut(dependency) {
            info!(dependency, "Circuit breaker manually reset");
            circuit.transition(dependency, CircuitState::Closed);
        }
    }

    /// Close all circuits.
    pub fn reset_all(&self) {
        let mut circuits = self.circuits.write();
        for (dependency, circuit) in circuits.iter_mut() {
            info!(dependency = %dependency, "Circuit breaker manually reset");
            circuit.transition(dependency, CircuitState::Closed);
        }
    }
}

/// One admitted call. Settle it with [`CallPermit::succeed`] or
/// [`CallPermit::fail`]; dropping it unsettled records an abandoned call.
#[must_use = "dropping a permit records the call as abandoned"]
pub struct CallPermit<'a> {
    manager: &'a CircuitBreakerManager,
    dependency: &'a str,
    settled: bool,
}

impl CallPermit<'_> {
    /// The dependency responded.
    pub fn succeed(mut self) {
        self.settled = true;
        self.manager.record_success(self.dependency);
    }

    /// The dependency failed or timed out.
    pub fn fail(mut self) {
        self.settled = true;
        self.manager.record_failure(self.dependency);
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.manager.record_abandoned(self.dependency);
        }
    }
}

/// Statistics for one circuit
#[derive(Debug, Clone, Serialize)]
pub struct CircuitStats {
    pub dependency: String,
    pub state: CircuitState,
    pub recent_failures: u32,
    pub total_requests: u64,
    pub total_failures: u64,
    pub total_rejected: u64,
    pub time_in_state_ms: u64,
}
