//! In-memory intent log.

use crate::domain::{IdempotencyKey, IntentState, ScoreIntent};
use crate::ports::outbound::{IntentInsert, IntentStore};
use async_trait::async_trait;
use cl_01_store::adapters::Access;
use cl_01_store::FaultInjector;
use parking_lot::RwLock;
use shared_types::{AggregateKind, IntentId, StoreError, Timestamp};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct Log {
    intents: HashMap<IntentId, ScoreIntent>,
    by_key: HashMap<IdempotencyKey, IntentId>,
}

/// Intent log kept next to the contest store; shares its fault switch in
/// simulations so a contest-store outage also stalls intent bookkeeping.
pub struct InMemoryIntentStore {
    log: RwLock<Log>,
    faults: Arc<FaultInjector>,
}

impl InMemoryIntentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_faults(Arc::new(FaultInjector::new(AggregateKind::Contest)))
    }

    #[must_use]
    pub fn with_faults(faults: Arc<FaultInjector>) -> Self {
        Self {
            log: RwLock::new(Log::default()),
            faults,
        }
    }

    #[must_use]
    pub fn faults(&self) -> Arc<FaultInjector> {
        Arc::clone(&self.faults)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.log.read().intents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryIntentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IntentStore for InMemoryIntentStore {
    async fn insert_if_absent(&self, intent: ScoreIntent) -> Result<IntentInsert, StoreError> {
        self.faults.before(Access::Write).await?;
        let mut log = self.log.write();
        if let Some(existing) = log.by_key.get(&intent.key).and_then(|id| log.intents.get(id)) {
            return Ok(IntentInsert::Existing(existing.clone()));
        }
        log.by_key.insert(intent.key.clone(), intent.id);
        log.intents.insert(intent.id, intent.clone());
        Ok(IntentInsert::Inserted(intent))
    }

    async fn get(&self, id: &IntentId) -> Result<Option<ScoreIntent>, StoreError> {
        self.faults.before(Access::Read).await?;
        Ok(self.log.read().intents.get(id).cloned())
    }

    async fn find_by_key(&self, key: &IdempotencyKey) -> Result<Option<ScoreIntent>, StoreError> {
        self.faults.before(Access::Read).await?;
        let log = self.log.read();
        Ok(log.by_key.get(key).and_then(|id| log.intents.get(id)).cloned())
    }

    async fn update(&self, intent: &ScoreIntent) -> Result<ScoreIntent, StoreError> {
        self.faults.before(Access::Write).await?;
        let mut log = self.log.write();
        let Some(stored) = log.intents.get_mut(&intent.id) else {
            return Err(StoreError::not_found(AggregateKind::Contest, intent.id));
        };
        if stored.state != IntentState::Pending || stored.version != intent.version {
            return Err(StoreError::VersionConflict {
                kind: AggregateKind::Contest,
                id: intent.id.to_string(),
                expected: intent.version,
                actual: stored.version,
            });
        }
        let mut next = intent.clone();
        next.version += 1;
        *stored = next.clone();
        Ok(next)
    }

    async fn pending(&self, touched_before: Timestamp) -> Result<Vec<ScoreIntent>, StoreError> {
        self.faults.before(Access::Read).await?;
        let mut pending: Vec<ScoreIntent> = self
            .log
            .read()
            .intents
            .values()
            .filter(|i| i.state == IntentState::Pending && i.updated_at <= touched_before)
            .cloned()
            .collect();
        pending.sort_by_key(|i| (i.created_at, i.id));
        Ok(pending)
    }

    async fn pending_count(&self) -> Result<usize, StoreError> {
        Ok(self
            .log
            .read()
            .intents
            .values()
            .filter(|i| i.state == IntentState::Pending)
            .count())
    }
}
