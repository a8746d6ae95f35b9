//! Driven ports: intent persistence.
//!
//! Contest, user and group stores come from `cl-01-store`.

use crate::domain::{IdempotencyKey, ScoreIntent};
use async_trait::async_trait;
use shared_types::{IntentId, StoreError, Timestamp};

/// Outcome of registering a new intent.
#[derive(Debug, Clone)]
pub enum IntentInsert {
    Inserted(ScoreIntent),
    /// An intent with the same idempotency key already exists.
    Existing(ScoreIntent),
}

/// Durable intent log owned by the contest service.
#[async_trait]
pub trait IntentStore: Send + Sync {
    /// Store `intent` unless its idempotency key is taken. Atomic.
    async fn insert_if_absent(&self, intent: ScoreIntent) -> Result<IntentInsert, StoreError>;

    async fn get(&self, id: &IntentId) -> Result<Option<ScoreIntent>, StoreError>;

    async fn find_by_key(&self, key: &IdempotencyKey) -> Result<Option<ScoreIntent>, StoreError>;

    /// Replace the stored intent if it is still pending at `intent.version`.
    ///
    /// Returns the stored copy with its version bumped. A stored intent that
    /// is terminal, or newer than `intent`, is a `VersionConflict`.
    async fn update(&self, intent: &ScoreIntent) -> Result<ScoreIntent, StoreError>;

    /// Pending intents last touched at or before `touched_before`, oldest first.
    async fn pending(&self, touched_before: Timestamp) -> Result<Vec<ScoreIntent>, StoreError>;

    async fn pending_count(&self) -> Result<usize, StoreError>;
}
