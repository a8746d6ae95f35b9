//! # Submission Processor
//!
//! ```text
//!   submit(req)
//!     │
//!     ├─ key = client key | sha256(contest, user, problem, language, code)
//!     ├─ intent with key exists? ──yes──> resume it, receipt(replayed = true)
//!     │
//!     ├─ contest = require(contest)     NotFound | ServiceUnavailable
//!     ├─ ensure_active(contest)         ContestNotActive
//!     ├─ user    = require(user)        NotFound | ServiceUnavailable
//!     ├─ check_eligibility              BadRequest
//!     ├─ intents.insert_if_absent       (race loser resumes the winner)
//!     │
//!     └─ drive(intent)
//!          ContestAppended  contests.append_submission   idempotent per intent id
//!          UserScored       scores.add_score(user)       idempotent per intent id
//!          GroupScored      scores.add_score(group)      idempotent per intent id
//!          ──> Completed, publish submission.accepted (event id = intent id)
//! ```
//!
//! A failed step leaves the intent pending with `attempts + 1`. A retried
//! request with the same key, an explicit `resume`, or the recovery sweep
//! drives it further. After `max_attempts` the sweep dead-letters it and
//! publishes `intent.dead_lettered` on the DLQ topic.
//!
//! Intent-log calls run under the contest store's guard, so they share its
//! deadline and circuit. Every intent write is a compare-and-set on the
//! intent's version: a driver or sweeper holding a stale copy loses with
//! `Contention` and rereads instead of overwriting newer progress.

use crate::domain::{
    check_eligibility, ensure_active, IdempotencyKey, IntentState, SagaStep, ScoreIntent,
};
use crate::ports::inbound::{RecoveryReport, SubmissionApi, SubmissionReceipt, SubmitRequest};
use crate::ports::outbound::{IntentInsert, IntentStore};
use async_trait::async_trait;
use cl_01_store::ContestStore;
use cl_02_resilience::{ContestReader, UserReader};
use cl_04_scoring::{ScoreApi, ScoreTarget};
use platform_telemetry::{log_contest_event, PENDING_INTENTS, SCORE_INTENTS, SUBMISSIONS};
use shared_bus::{EventEnvelope, EventPublisher, PlatformEvent};
use shared_types::{
    AggregateKind, IntentId, PlatformError, PlatformResult, StoreError, TimeSource,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct SagaConfig {
    /// Pending intents untouched for this long are picked up by recovery.
    pub recovery_grace: Duration,
    /// Failed drive attempts before an intent is dead-lettered.
    pub max_attempts: u32,
    /// Interval between recovery sweeps.
    pub sweep_interval: Duration,
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            recovery_grace: Duration::from_secs(30),
            max_attempts: 5,
            sweep_interval: Duration::from_secs(15),
        }
    }
}

pub struct SubmissionProcessor {
    contests: ContestReader,
    users: UserReader,
    scores: Arc<dyn ScoreApi>,
    intents: Arc<dyn IntentStore>,
    publisher: Arc<dyn EventPublisher>,
    time: Arc<dyn TimeSource>,
    config: SagaConfig,
}

impl SubmissionProcessor {
    pub fn new(
        contests: ContestReader,
        users: UserReader,
        scores: Arc<dyn ScoreApi>,
        intents: Arc<dyn IntentStore>,
        publisher: Arc<dyn EventPublisher>,
        time: Arc<dyn TimeSource>,
        config: SagaConfig,
    ) -> Self {
        Self {
            contests,
            users,
            scores,
            intents,
            publisher,
            time,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &SagaConfig {
        &self.config
    }

    fn receipt(intent: &ScoreIntent, replayed: bool) -> SubmissionReceipt {
        SubmissionReceipt {
            intent_id: intent.id,
            contest_id: intent.contest.clone(),
            group_id: intent.group.clone(),
            score: intent.score,
            replayed,
            state: intent.state,
        }
    }

    /// Run an intent-log call under the contest store's deadline and circuit.
    async fn logged<T, Fut>(&self, call: Fut) -> PlatformResult<T>
    where
        Fut: Future<Output = Result<T, StoreError>>,
    {
        self.contests
            .guard()
            .write(AggregateKind::Contest.dependency_name(), call)
            .await
    }

    fn dead_lettered_error(intent: &ScoreIntent) -> PlatformError {
        PlatformError::Internal(format!(
            "submission {} was dead-lettered: {}",
            intent.id,
            intent.last_error.as_deref().unwrap_or_default()
        ))
    }

    async fn apply_step(&self, intent: &ScoreIntent, step: SagaStep) -> PlatformResult<()> {
        match step {
            SagaStep::ContestAppended => {
                let store = self.contests.store();
                let result = self
                    .contests
                    .guard()
                    .write(
                        AggregateKind::Contest.dependency_name(),
                        store.append_submission(&intent.contest, intent.submission()),
                    )
                    .await;
                self.contests.invalidate(&intent.contest).await;
                result.map(|_| ())
            }
            SagaStep::UserScored => self
                .scores
                .add_score(
                    ScoreTarget::User(intent.user.clone()),
                    intent.score,
                    &intent.operation_key(),
                )
                .await
                .map(|_| ()),
            SagaStep::GroupScored => self
                .scores
                .add_score(
                    ScoreTarget::Group(intent.group.clone()),
                    intent.score,
                    &intent.operation_key(),
                )
                .await
                .map(|_| ()),
        }
    }

    /// Run the remaining steps of `intent`, persisting progress after each.
    ///
    /// Steps are idempotent per intent id, so losing a version race only
    /// costs a reread: a completed intent is returned as is (its driver
    /// already announced it), a pending one continues from the stored copy.
    async fn drive(&self, mut intent: ScoreIntent) -> PlatformResult<ScoreIntent> {
        while let Some(step) = intent.next_step() {
            if let Err(e) = self.apply_step(&intent, step).await {
                warn!(
                    intent_id = %intent.id,
                    contest_id = %intent.contest,
                    %step,
                    attempts = intent.attempts + 1,
                    error = %e,
                    "Saga step failed, intent left pending"
                );
                intent.record_failure(&e.to_string(), self.time.now());
                match self.logged(self.intents.update(&intent)).await {
                    Ok(_) => {}
                    Err(PlatformError::Contention { .. }) => {
                        debug!(intent_id = %intent.id, "Intent moved on, failure not recorded");
                    }
                    Err(store_err) => {
                        error!(intent_id = %intent.id, error = %store_err, "Failed to record intent failure");
                    }
                }
                self.update_pending_gauge().await;
                return Err(e);
            }
            intent.mark(step, self.time.now());
            intent = match self.logged(self.intents.update(&intent)).await {
                Ok(stored) => stored,
                Err(PlatformError::Contention { .. }) => {
                    let fresh = self.reload(&intent.id).await?;
                    match fresh.state {
                        IntentState::Pending => fresh,
                        IntentState::Completed => {
                            debug!(intent_id = %fresh.id, "Intent completed by another driver");
                            self.update_pending_gauge().await;
                            return Ok(fresh);
                        }
                        IntentState::DeadLettered => return Err(Self::dead_lettered_error(&fresh)),
                    }
                }
                Err(e) => return Err(e),
            };
        }

        self.update_pending_gauge().await;
        self.announce(&intent).await;
        Ok(intent)
    }

    async fn reload(&self, id: &IntentId) -> PlatformResult<ScoreIntent> {
        self.logged(self.intents.get(id))
            .await?
            .ok_or_else(|| PlatformError::NotFound {
                kind: AggregateKind::Contest,
                id: format!("intent {id}"),
            })
    }

    async fn announce(&self, intent: &ScoreIntent) {
        let event = PlatformEvent::SubmissionAccepted {
            intent_id: intent.id,
            contest_id: intent.contest.clone(),
            user_id: intent.user.clone(),
            group_id: intent.group.clone(),
            problem_index: intent.problem_index,
            score: intent.score,
        };
        self.publisher
            .publish(EventEnvelope::with_event_id(
                intent.id.as_uuid(),
                event,
                self.time.now(),
            ))
            .await;
    }

    /// Park an exhausted intent. `false` when the intent changed since it
    /// was read; nothing is published then.
    async fn dead_letter(&self, mut intent: ScoreIntent) -> PlatformResult<bool> {
        intent.dead_letter(self.time.now());
        let intent = match self.logged(self.intents.update(&intent)).await {
            Ok(stored) => stored,
            Err(PlatformError::Contention { .. }) => {
                debug!(intent_id = %intent.id, "Intent changed since the sweep read it, not dead-lettering");
                return Ok(false);
            }
            Err(e) => return Err(e),
        };
        log_contest_event!(
            error,
            "contest",
            "Score intent dead-lettered",
            intent.contest,
            intent_id = %intent.id,
            attempts = intent.attempts,
            last_error = intent.last_error.as_deref().unwrap_or("")
        );
        SCORE_INTENTS.with_label_values(&["dead_lettered"]).inc();
        self.publisher
            .publish(EventEnvelope::new(
                PlatformEvent::IntentDeadLettered {
                    intent_id: intent.id,
                    contest_id: intent.contest.clone(),
                    attempts: intent.attempts,
                    last_error: intent.last_error.clone().unwrap_or_default(),
                },
                self.time.now(),
            ))
            .await;
        Ok(true)
    }

    async fn update_pending_gauge(&self) {
        let counted = self
            .contests
            .guard()
            .execute(
                AggregateKind::Contest.dependency_name(),
                self.intents.pending_count(),
            )
            .await;
        if let Ok(Ok(count)) = counted {
            PENDING_INTENTS.set(count as f64);
        }
    }

    /// Answer a repeated request from its existing intent.
    async fn replay(&self, intent: ScoreIntent) -> PlatformResult<SubmissionReceipt> {
        SUBMISSIONS.with_label_values(&["replayed"]).inc();
        match intent.state {
            IntentState::Completed => Ok(Self::receipt(&intent, true)),
            IntentState::Pending => {
                info!(intent_id = %intent.id, "Retried submission resumes pending intent");
                let intent = self.drive(intent).await?;
                SCORE_INTENTS.with_label_values(&["completed"]).inc();
                Ok(Self::receipt(&intent, true))
            }
            IntentState::DeadLettered => Err(Self::dead_lettered_error(&intent)),
        }
    }
}

#[async_trait]
impl SubmissionApi for SubmissionProcessor {
    #[instrument(skip(self, request), fields(contest_id = %request.contest_id, user_id = %request.user_id))]
    async fn submit(&self, request: SubmitRequest) -> PlatformResult<SubmissionReceipt> {
        let key = match request.idempotency_key.as_deref() {
            Some(client_key) => IdempotencyKey::from_client(&request.user_id, client_key),
            None => IdempotencyKey::derive(
                &request.contest_id,
                &request.user_id,
                request.problem_index,
                &request.language,
                &request.code,
            ),
        };

        if let Some(existing) = self.logged(self.intents.find_by_key(&key)).await? {
            return self.replay(existing).await;
        }

        let checked = async {
            let contest = self.contests.require(&request.contest_id).await?;
            ensure_active(&contest, self.time.now())?;
            let user = self.users.require(&request.user_id).await?;
            check_eligibility(&contest, &user, request.problem_index, self.time.now())
        }
        .await;
        let eligibility = match checked {
            Ok(e) => e,
            Err(e) => {
                SUBMISSIONS.with_label_values(&["rejected"]).inc();
                return Err(e);
            }
        };

        let intent = ScoreIntent::new(
            key,
            request.contest_id,
            request.user_id,
            eligibility.group,
            request.problem_index,
            request.code,
            request.language,
            eligibility.score,
            self.time.now(),
        );

        let intent = match self.logged(self.intents.insert_if_absent(intent)).await? {
            IntentInsert::Inserted(intent) => intent,
            IntentInsert::Existing(existing) => return self.replay(existing).await,
        };

        match self.drive(intent).await {
            Ok(intent) => {
                SUBMISSIONS.with_label_values(&["accepted"]).inc();
                SCORE_INTENTS.with_label_values(&["completed"]).inc();
                info!(intent_id = %intent.id, score = intent.score, group_id = %intent.group, "Submission accepted");
                Ok(Self::receipt(&intent, false))
            }
            Err(e) => {
                SUBMISSIONS.with_label_values(&["pending"]).inc();
                Err(e)
            }
        }
    }

    async fn resume(&self, intent_id: &IntentId) -> PlatformResult<SubmissionReceipt> {
        let intent = self.reload(intent_id).await?;
        if !intent.is_pending() {
            return Ok(Self::receipt(&intent, true));
        }
        let intent = self.drive(intent).await?;
        SCORE_INTENTS.with_label_values(&["recovered"]).inc();
        Ok(Self::receipt(&intent, true))
    }

    async fn recover_incomplete(&self) -> PlatformResult<RecoveryReport> {
        let grace = self.config.recovery_grace.as_millis() as u64;
        let cutoff = self.time.now().saturating_sub(grace);
        let stale = self.logged(self.intents.pending(cutoff)).await?;

        let mut report = RecoveryReport {
            scanned: stale.len(),
            ..RecoveryReport::default()
        };

        for intent in stale {
            if intent.attempts >= self.config.max_attempts {
                if self.dead_letter(intent).await? {
                    report.dead_lettered += 1;
                }
                continue;
            }
            let id = intent.id;
            match self.drive(intent).await {
                Ok(_) => {
                    SCORE_INTENTS.with_label_values(&["recovered"]).inc();
                    info!(intent_id = %id, "Recovered pending score intent");
                    report.recovered += 1;
                }
                Err(_) => report.still_pending += 1,
            }
        }

        self.update_pending_gauge().await;
        if report.scanned > 0 {
            info!(
                scanned = report.scanned,
                recovered = report.recovered,
                still_pending = report.still_pending,
                dead_lettered = report.dead_lettered,
                "Recovery sweep finished"
            );
        }
        Ok(report)
    }
}
