//! Notification consumer.
//!
//! The bus gives no delivery guarantee beyond at-least-once for republished
//! events (a recovered submission announces itself again under the same
//! event id). The consumer drops any event id it has already handled within
//! the dedup window, and anything published before the window started.

use std::sync::Arc;

use async_trait::async_trait;
use platform_telemetry::DUPLICATE_EVENTS;
use shared_bus::{DedupError, EventEnvelope, EventStream, PlatformEvent, TimeBoundedDedupCache};
use shared_types::TimeSource;
use tokio::sync::watch;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

/// Where accepted notifications go.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, envelope: &EventEnvelope);
}

/// Writes notifications to the log. Dead-lettered intents are errors.
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, envelope: &EventEnvelope) {
        match &envelope.payload {
            PlatformEvent::IntentDeadLettered {
                intent_id,
                contest_id,
                attempts,
                last_error,
            } => error!(
                %intent_id,
                %contest_id,
                attempts,
                %last_error,
                "Score intent dead-lettered, manual repair needed"
            ),
            _ => info!(
                event_id = %envelope.event_id,
                exchange = envelope.topic.exchange(),
                routing_key = %envelope.routing_key,
                "Notification"
            ),
        }
    }
}

pub struct NotificationConsumer {
    stream: EventStream,
    dedup: TimeBoundedDedupCache,
    sink: Arc<dyn NotificationSink>,
    time: Arc<dyn TimeSource>,
}

impl NotificationConsumer {
    pub fn new(
        stream: EventStream,
        sink: Arc<dyn NotificationSink>,
        time: Arc<dyn TimeSource>,
        dedup_window_ms: u64,
    ) -> Self {
        Self {
            stream,
            dedup: TimeBoundedDedupCache::with_config(
                dedup_window_ms,
                TimeBoundedDedupCache::DEFAULT_GC_INTERVAL_MS,
            ),
            sink,
            time,
        }
    }

    /// Deliver `envelope` unless it was already handled. Returns whether it
    /// was delivered.
    pub async fn handle(&mut self, envelope: EventEnvelope) -> bool {
        let now = self.time.now();
        match self
            .dedup
            .check_and_record(envelope.event_id, envelope.published_at, now)
        {
            Ok(()) => {
                self.sink.deliver(&envelope).await;
                true
            }
            Err(DedupError::Duplicate { event_id }) => {
                DUPLICATE_EVENTS.inc();
                debug!(%event_id, routing_key = %envelope.routing_key, "Duplicate event dropped");
                false
            }
            Err(e @ DedupError::Expired { .. }) => {
                warn!(event_id = %envelope.event_id, reason = %e, "Stale event dropped");
                false
            }
        }
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Notification consumer started");
        loop {
            tokio::select! {
                next = self.stream.next() => match next {
                    Some(envelope) => {
                        self.handle(envelope).await;
                    }
                    None => {
                        info!("Event stream closed, notification consumer stopping");
                        return;
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Notification consumer stopping");
                        return;
                    }
                }
            }
        }
    }
}
