//! # Platform Events
//!
//! Every state change other services may observe. Each event maps to one
//! exchange ([`EventTopic`]) and one routing key, mirroring the
//! `Publish(topic, routingKey, payload)` contract of the message broker.
//!
//! ```text
//! user.exchange     user.created | user.updated | score.changed
//! group.exchange    group.created | group.member_joined | group.member_left
//!                   group.deleted | score.changed
//! contest.exchange  contest.created | contest.deleted
//!                   contest.status_changed | submission.accepted
//! dlq.critical      intent.dead_lettered
//! ```

use serde::{Deserialize, Serialize};
use shared_types::{
    AggregateKind, ContestId, ContestStatus, GroupId, IntentId, Timestamp, UserId,
};
use uuid::Uuid;

/// Payload of a published event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlatformEvent {
    // =========================================================================
    // USERS
    // =========================================================================
    UserCreated {
        user_id: UserId,
        email: String,
    },

    UserUpdated {
        user_id: UserId,
    },

    /// A score accumulator changed. Published on the exchange of the
    /// aggregate that was scored.
    ScoreChanged {
        kind: AggregateKind,
        id: String,
        delta: i64,
        new_total: i64,
        /// What earned the points (e.g. `post_created`).
        reason: String,
    },

    // =========================================================================
    // GROUPS
    // =========================================================================
    GroupCreated {
        group_id: GroupId,
        creator: UserId,
    },

    MemberJoined {
        group_id: GroupId,
        user_id: UserId,
    },

    MemberLeft {
        group_id: GroupId,
        user_id: UserId,
    },

    GroupDeleted {
        group_id: GroupId,
    },

    // =========================================================================
    // CONTESTS
    // =========================================================================
    ContestCreated {
        contest_id: ContestId,
        creator: UserId,
        start_time: Timestamp,
        end_time: Timestamp,
    },

    ContestDeleted {
        contest_id: ContestId,
    },

    ContestStatusChanged {
        contest_id: ContestId,
        from: ContestStatus,
        to: ContestStatus,
    },

    /// A submission was fully applied to contest, user and group.
    SubmissionAccepted {
        intent_id: IntentId,
        contest_id: ContestId,
        user_id: UserId,
        group_id: GroupId,
        problem_index: usize,
        score: i64,
    },

    // =========================================================================
    // DEAD LETTER QUEUE
    // =========================================================================
    /// A score intent exhausted its recovery attempts.
    IntentDeadLettered {
        intent_id: IntentId,
        contest_id: ContestId,
        attempts: u32,
        last_error: String,
    },
}

impl PlatformEvent {
    /// Exchange this event is published to.
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::UserCreated { .. } | Self::UserUpdated { .. } => EventTopic::User,
            Self::ScoreChanged { kind, .. } => match kind {
                AggregateKind::Group => EventTopic::Group,
                AggregateKind::Contest => EventTopic::Contest,
                AggregateKind::User | AggregateKind::Post => EventTopic::User,
            },
            Self::GroupCreated { .. }
            | Self::MemberJoined { .. }
            | Self::MemberLeft { .. }
            | Self::GroupDeleted { .. } => EventTopic::Group,
            Self::ContestCreated { .. }
            | Self::ContestDeleted { .. }
            | Self::ContestStatusChanged { .. }
            | Self::SubmissionAccepted { .. } => EventTopic::Contest,
            Self::IntentDeadLettered { .. } => EventTopic::DeadLetterQueue,
        }
    }

    /// Routing key within the exchange.
    #[must_use]
    pub fn routing_key(&self) -> &'static str {
        match self {
            Self::UserCreated { .. } => "user.created",
            Self::UserUpdated { .. } => "user.updated",
            Self::ScoreChanged { .. } => "score.changed",
            Self::GroupCreated { .. } => "group.created",
            Self::MemberJoined { .. } => "group.member_joined",
            Self::MemberLeft { .. } => "group.member_left",
            Self::GroupDeleted { .. } => "group.deleted",
            Self::ContestCreated { .. } => "contest.created",
            Self::ContestDeleted { .. } => "contest.deleted",
            Self::ContestStatusChanged { .. } => "contest.status_changed",
            Self::SubmissionAccepted { .. } => "submission.accepted",
            Self::IntentDeadLettered { .. } => "intent.dead_lettered",
        }
    }
}

/// Exchanges events are published to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    User,
    Group,
    Contest,
    /// Critical failures that need operator attention.
    DeadLetterQueue,
    /// All events (no filtering).
    All,
}

impl EventTopic {
    /// Broker exchange name.
    #[must_use]
    pub fn exchange(self) -> &'static str {
        match self {
            Self::User => "user.exchange",
            Self::Group => "group.exchange",
            Self::Contest => "contest.exchange",
            Self::DeadLetterQueue => crate::DLQ_TOPIC,
            Self::All => "*",
        }
    }
}

/// Wire envelope around a published event.
///
/// Delivery is at-least-once from a consumer's point of view, so consumers
/// deduplicate on `event_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: Uuid,
    pub topic: EventTopic,
    pub routing_key: String,
    pub published_at: Timestamp,
    pub payload: PlatformEvent,
}

impl EventEnvelope {
    /// Wrap an event under a fresh event id.
    #[must_use]
    pub fn new(payload: PlatformEvent, published_at: Timestamp) -> Self {
        Self::with_event_id(Uuid::new_v4(), payload, published_at)
    }

    /// Wrap an event under a caller-chosen id, so a republish of the same
    /// fact carries the same id.
    #[must_use]
    pub fn with_event_id(event_id: Uuid, payload: PlatformEvent, published_at: Timestamp) -> Self {
        Self {
            event_id,
            topic: payload.topic(),
            routing_key: payload.routing_key().to_string(),
            published_at,
            payload,
        }
    }
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Routing keys to include. Empty means all keys.
    pub routing_keys: Vec<String>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            routing_keys: Vec::new(),
        }
    }

    /// Create a filter for specific routing keys.
    #[must_use]
    pub fn routing_keys<S: Into<String>>(keys: impl IntoIterator<Item = S>) -> Self {
        Self {
            topics: Vec::new(),
            routing_keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, envelope: &EventEnvelope) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&envelope.topic);

        let key_match =
            self.routing_keys.is_empty() || self.routing_keys.contains(&envelope.routing_key);

        topic_match && key_match
    }
}
