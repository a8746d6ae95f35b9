//! # Shared Bus - Event Publication for Downstream Consistency
//!
//! Services announce state changes here; other services observe them.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │  Contest /   │                    │ Notification │
//! │  Membership  │    publish()       │   consumer   │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │          │
//!                  │              │ ─────────┘
//!                  └──────────────┘  subscribe()
//! ```
//!
//! ## Delivery
//!
//! - **Fire-and-forget:** publishers never observe acknowledgment.
//! - **No ordering across topics.**
//! - **At-least-once for consumers:** consumers deduplicate by event id with
//!   [`TimeBoundedDedupCache`].
//! - **Dead Letter Queue:** unrecoverable failures go to [`DLQ_TOPIC`].

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod dedup;
pub mod events;
pub mod publisher;
pub mod subscriber;

pub use dedup::{DedupError, TimeBoundedDedupCache};
pub use events::{EventEnvelope, EventFilter, EventTopic, PlatformEvent};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before the slowest one lags.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Dead Letter Queue exchange for critical failures.
pub const DLQ_TOPIC: &str = "dlq.critical";
