//! # Event Subscriber
//!
//! Defines the subscription side of the event bus.

use crate::events::{EventEnvelope, EventFilter};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::Stream;
use tracing::debug;

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The event bus was closed.
    #[error("Event bus closed")]
    Closed,
}

/// A subscription handle for receiving events.
///
/// When dropped, the subscription is automatically cleaned up.
pub struct Subscription {
    receiver: broadcast::Receiver<EventEnvelope>,
    filter: EventFilter,
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,
    filter_key: String,
}

impl Subscription {
    pub(crate) fn new(
        receiver: broadcast::Receiver<EventEnvelope>,
        filter: EventFilter,
        subscriptions: Arc<RwLock<HashMap<String, usize>>>,
        filter_key: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            subscriptions,
            filter_key,
        }
    }

    /// Receive the next event that matches the filter.
    ///
    /// Returns `None` once the bus has been dropped. Events lost to lag are
    /// skipped; the bus makes no delivery guarantee.
    pub async fn recv(&mut self) -> Option<EventEnvelope> {
        loop {
            let envelope = match self.receiver.recv().await {
                Ok(e) => e,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    debug!(lagged = count, "Subscriber lagged, some events dropped");
                    continue;
                }
            };

            if self.filter.matches(&envelope) {
                return Some(envelope);
            }
        }
    }

    /// Try to receive the next matching event without blocking.
    pub fn try_recv(&mut self) -> Result<Option<EventEnvelope>, SubscriptionError> {
        loop {
            let envelope = match self.receiver.try_recv() {
                Ok(e) => e,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            };

            if self.filter.matches(&envelope) {
                return Ok(Some(envelope));
            }
        }
    }

    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let mut subs = self.subscriptions.write();
        if let Some(count) = subs.get_mut(&self.filter_key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                subs.remove(&self.filter_key);
            }
        }
        debug!(filter = %self.filter_key, "Subscription dropped");
    }
}

/// A filtered stream of events.
///
/// Implements `tokio_stream::Stream` for use with stream combinators.
pub struct EventStream {
    inner: BroadcastStream<EventEnvelope>,
    filter: EventFilter,
}

impl EventStream {
    #[must_use]
    pub fn new(receiver: broadcast::Receiver<EventEnvelope>, filter: EventFilter) -> Self {
        Self {
            inner: BroadcastStream::new(receiver),
            filter,
        }
    }

    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }
}

impl Stream for EventStream {
    type Item = EventEnvelope;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(envelope))) => {
                    if self.filter.matches(&envelope) {
                        return Poll::Ready(Some(envelope));
                    }
                }
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(count)))) => {
                    debug!(lagged = count, "Event stream lagged, some events dropped");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventTopic, PlatformEvent};
    use crate::publisher::InMemoryEventBus;
    use crate::EventPublisher;
    use shared_types::{ContestId, GroupId};
    use std::time::Duration;
    use tokio::time::timeout;
    use tokio_stream::StreamExt;

    fn contest_deleted() -> EventEnvelope {
        EventEnvelope::new(
            PlatformEvent::ContestDeleted {
                contest_id: ContestId::new("c1"),
            },
            0,
        )
    }

    fn group_deleted() -> EventEnvelope {
        EventEnvelope::new(
            PlatformEvent::GroupDeleted {
                group_id: GroupId::new("g1"),
            },
            0,
        )
    }

    #[tokio::test]
    async fn test_subscription_filter() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe(EventFilter::topics(vec![EventTopic::Contest]));

        bus.publish(group_deleted()).await;
        bus.publish(contest_deleted()).await;

        let received = timeout(Duration::from_millis(100), sub.recv())
            .await
            .expect("timeout")
            .expect("event");

        assert_eq!(received.routing_key, "contest.deleted");
    }

    #[tokio::test]
    async fn test_subscription_drop_cleanup() {
        let bus = InMemoryEventBus::new();

        {
            let _sub1 = bus.subscribe(EventFilter::all());
            let _sub2 = bus.subscribe(EventFilter::all());
            assert_eq!(bus.subscriber_count(), 2);
        }

        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus.subscriptions_by_filter().is_empty());
    }

    #[tokio::test]
    async fn test_try_recv_empty_then_event() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe(EventFilter::all());

        assert!(matches!(sub.try_recv(), Ok(None)));

        bus.publish(contest_deleted()).await;
        assert!(matches!(sub.try_recv(), Ok(Some(_))));
    }

    #[tokio::test]
    async fn test_event_stream_skips_unmatched() {
        let bus = InMemoryEventBus::new();
        let mut stream = bus.event_stream(EventFilter::routing_keys(["group.deleted"]));

        bus.publish(contest_deleted()).await;
        bus.publish(group_deleted()).await;

        let received = timeout(Duration::from_millis(100), stream.next())
            .await
            .expect("timeout")
            .expect("event");
        assert_eq!(received.routing_key, "group.deleted");
    }
}
