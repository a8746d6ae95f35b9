//! # Resilience Layer (cl-02)
//!
//! Explicit wrappers around store calls:
//!
//! ```text
//!   service ──> ResilientReader ──> CacheAside ──miss──> ResilienceGuard ──> store
//!                                                            │
//!                                                   CircuitBreakerManager
//! ```
//!
//! | Path | Degraded dependency |
//! |------|---------------------|
//! | point read (`get_by_id`) | absent |
//! | point read (`lookup`) | `Lookup::Unavailable` |
//! | list / top-N | empty list |
//! | write | `PlatformError::ServiceUnavailable`, never dropped |
//!
//! Every guarded call carries a deadline; a timeout is a breaker failure.

pub mod cache;
pub mod circuit_breaker;
pub mod guard;
pub mod reader;

pub use cache::{CacheAside, CacheConfig, CacheTicket, CreateInvalidation, InMemoryCache};
pub use circuit_breaker::{CallPermit, CircuitBreakerConfig, CircuitBreakerManager, CircuitState, CircuitStats};
pub use guard::{Degraded, FailureKind, ResilienceConfig, ResilienceGuard, DEFAULT_CALL_TIMEOUT};
pub use reader::{ContestReader, GroupReader, Lookup, ResilientReader, UserReader};
