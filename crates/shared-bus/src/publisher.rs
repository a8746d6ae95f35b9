//! # Event Publisher
//!
//! Defines the publishing side of the event bus.
//!
//! Publishing is fire-and-forget: the caller learns how many subscribers
//! were live, never whether anyone processed the event.

use crate::events::{EventEnvelope, EventFilter};
use crate::subscriber::{EventStream, Subscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use parking_lot::RwLock;
use platform_telemetry::EVENTS_PUBLISHED;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Trait for publishing events to the bus.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event.
    ///
    /// # Returns
    ///
    /// The number of active subscribers that received the event.
    async fn publish(&self, envelope: EventEnvelope) -> usize;

    /// Get the total number of events published.
    fn events_published(&self) -> u64;
}

/// In-memory implementation of the event bus.
///
/// Uses `tokio::sync::broadcast` for multi-producer, multi-consumer semantics.
/// A broker-backed implementation would publish to the envelope's exchange
/// with its routing key.
pub struct InMemoryEventBus {
    /// Broadcast sender for events.
    sender: broadcast::Sender<EventEnvelope>,

    /// Active subscription count by filter key.
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,

    /// Total events published.
    events_published: AtomicU64,

    /// Channel capacity.
    capacity: usize,
}

impl InMemoryEventBus {
    /// Create a new in-memory event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new in-memory event bus with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            events_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Subscribe to events matching a filter.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        let receiver = self.sender.subscribe();
        let filter_key = format!("{:?}|{:?}", filter.topics, filter.routing_keys);

        *self
            .subscriptions
            .write()
            .entry(filter_key.clone())
            .or_insert(0) += 1;

        debug!(topics = ?filter.topics, keys = ?filter.routing_keys, "New subscription created");

        Subscription::new(receiver, filter, self.subscriptions.clone(), filter_key)
    }

    /// Get a stream of events matching a filter.
    #[must_use]
    pub fn event_stream(&self, filter: EventFilter) -> EventStream {
        EventStream::new(self.sender.subscribe(), filter)
    }

    /// Get the number of active receivers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Number of live subscriptions, grouped by filter.
    #[must_use]
    pub fn subscriptions_by_filter(&self) -> HashMap<String, usize> {
        self.subscriptions.read().clone()
    }

    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, envelope: EventEnvelope) -> usize {
        let exchange = envelope.topic.exchange();
        let routing_key = envelope.routing_key.clone();
        let event_id = envelope.event_id;

        // Counted even when nobody is listening.
        self.events_published.fetch_add(1, Ordering::Relaxed);
        EVENTS_PUBLISHED
            .with_label_values(&[exchange, &routing_key])
            .inc();

        match self.sender.send(envelope) {
            Ok(receiver_count) => {
                debug!(
                    exchange,
                    routing_key = %routing_key,
                    %event_id,
                    receivers = receiver_count,
                    "Event published"
                );
                receiver_count
            }
            Err(_) => {
                warn!(
                    exchange,
                    routing_key = %routing_key,
                    %event_id,
                    "Event dropped (no receivers)"
                );
                0
            }
        }
    }

    fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}
