//! Score Aggregator service.
//!
//! `add_score` is a single atomic store primitive per aggregate
//! (`apply_score_delta`), never a read-modify-write, so concurrent deltas on
//! one id cannot be lost. The cache entry for the id is invalidated after
//! every attempt, including failed and timed-out ones whose write may still
//! have landed.

use crate::domain::{Activity, ScoreOutcome, ScoreTarget};
use crate::ports::inbound::ScoreApi;
use async_trait::async_trait;
use cl_01_store::ScoreStore;
use cl_02_resilience::{GroupReader, UserReader};
use platform_telemetry::SCORE_DELTAS;
use shared_bus::{EventEnvelope, EventPublisher, PlatformEvent};
use shared_types::{AggregateKind, OperationKey, PlatformResult, TimeSource};
use std::sync::Arc;
use tracing::{debug, info};

pub struct ScoreAggregator {
    users: UserReader,
    groups: GroupReader,
    publisher: Arc<dyn EventPublisher>,
    time: Arc<dyn TimeSource>,
}

impl ScoreAggregator {
    pub fn new(
        users: UserReader,
        groups: GroupReader,
        publisher: Arc<dyn EventPublisher>,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            users,
            groups,
            publisher,
            time,
        }
    }

    #[must_use]
    pub fn users(&self) -> &UserReader {
        &self.users
    }

    #[must_use]
    pub fn groups(&self) -> &GroupReader {
        &self.groups
    }

    fn record(kind: AggregateKind, applied: bool) {
        let result = if applied { "applied" } else { "duplicate" };
        SCORE_DELTAS.with_label_values(&[kind.as_str(), result]).inc();
    }
}

#[async_trait]
impl ScoreApi for ScoreAggregator {
    async fn add_score(
        &self,
        target: ScoreTarget,
        delta: i64,
        op: &OperationKey,
    ) -> PlatformResult<ScoreOutcome> {
        let kind = target.kind();
        let result = match &target {
            ScoreTarget::User(id) => {
                let store = self.users.store();
                let result = self
                    .users
                    .guard()
                    .write(kind.dependency_name(), store.apply_score_delta(id, delta, op))
                    .await;
                self.users.invalidate(id).await;
                result
            }
            ScoreTarget::Group(id) => {
                let store = self.groups.store();
                let result = self
                    .groups
                    .guard()
                    .write(kind.dependency_name(), store.apply_score_delta(id, delta, op))
                    .await;
                self.groups.invalidate(id).await;
                result
            }
        }?;

        Self::record(kind, result.applied);
        debug!(
            %target,
            delta,
            new_total = result.new_total,
            applied = result.applied,
            op = %op,
            "Score delta processed"
        );

        Ok(ScoreOutcome {
            target,
            delta,
            new_total: result.new_total,
            applied: result.applied,
        })
    }

    async fn record_activity(&self, activity: &Activity) -> PlatformResult<ScoreOutcome> {
        let outcome = self
            .add_score(
                ScoreTarget::User(activity.beneficiary.clone()),
                activity.points(),
                &activity.operation_key(),
            )
            .await?;

        if outcome.applied {
            info!(
                user_id = %activity.beneficiary,
                activity = %activity.kind,
                points = activity.points(),
                "Activity scored"
            );
            let event = PlatformEvent::ScoreChanged {
                kind: AggregateKind::User,
                id: activity.beneficiary.to_string(),
                delta: outcome.delta,
                new_total: outcome.new_total,
                reason: activity.kind.to_string(),
            };
            self.publisher
                .publish(EventEnvelope::new(event, self.time.now()))
                .await;
        }

        Ok(outcome)
    }
}
