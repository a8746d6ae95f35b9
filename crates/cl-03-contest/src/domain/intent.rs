//! # Score Intent (saga record)
//!
//! A submission touches three aggregates with no shared transaction. The
//! intent is persisted first and then driven step by step:
//!
//! ```text
//!   ┌─────────┐  append   ┌─────────────────┐  +score  ┌────────────┐  +score  ┌─────────────┐
//!   │ PENDING │ ────────► │ ContestAppended │ ───────► │ UserScored │ ───────► │ GroupScored │
//!   └─────────┘           └─────────────────┘          └────────────┘          └─────────────┘
//!        │                                                                            │
//!        │ attempts >= max_attempts                                                   ▼
//!        ▼                                                                      ┌───────────┐
//!   ┌──────────────┐                                                            │ COMPLETED │
//!   │ DEAD-LETTERED│                                                            └───────────┘
//!   └──────────────┘
//! ```
//!
//! Every step is idempotent keyed by the intent id, so re-driving a step that
//! already landed (but was not yet recorded here) applies nothing twice.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shared_types::{
    ContestId, GroupId, IntentId, OperationKey, Submission, Timestamp, UserId,
};
use std::fmt;

/// One aggregate update driven by an intent, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SagaStep {
    ContestAppended,
    UserScored,
    GroupScored,
}

impl SagaStep {
    pub const ALL: [SagaStep; 3] = [
        SagaStep::ContestAppended,
        SagaStep::UserScored,
        SagaStep::GroupScored,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ContestAppended => "contest_appended",
            Self::UserScored => "user_scored",
            Self::GroupScored => "group_scored",
        }
    }
}

impl fmt::Display for SagaStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentState {
    Pending,
    Completed,
    /// Recovery gave up; needs an operator.
    DeadLettered,
}

/// Deduplication key of a submission request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Key supplied by the client, scoped to the submitting user.
    pub fn from_client(user: &UserId, key: &str) -> Self {
        Self(format!("client:{user}:{key}"))
    }

    /// Content-derived key: SHA-256 over the request fields.
    ///
    /// Fields are length-prefixed so `("ab", "c")` and `("a", "bc")` differ.
    pub fn derive(
        contest: &ContestId,
        user: &UserId,
        problem_index: usize,
        language: &str,
        code: &str,
    ) -> Self {
        let index = problem_index.to_string();
        let mut hasher = Sha256::new();
        for field in [
            contest.as_str().as_bytes(),
            user.as_str().as_bytes(),
            index.as_bytes(),
            language.as_bytes(),
            code.as_bytes(),
        ] {
            hasher.update((field.len() as u64).to_be_bytes());
            hasher.update(field);
        }
        Self(format!("sha256:{}", hex::encode(hasher.finalize())))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Durable record of one submission's multi-aggregate update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreIntent {
    pub id: IntentId,
    pub key: IdempotencyKey,
    pub contest: ContestId,
    pub user: UserId,
    pub group: GroupId,
    pub problem_index: usize,
    pub code: String,
    pub language: String,
    pub score: i64,
    /// Steps known to have landed, in order.
    pub completed_steps: Vec<SagaStep>,
    pub state: IntentState,
    /// Failed drive attempts.
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Bumped by the intent log on every accepted update.
    #[serde(default)]
    pub version: u64,
}

impl ScoreIntent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        key: IdempotencyKey,
        contest: ContestId,
        user: UserId,
        group: GroupId,
        problem_index: usize,
        code: String,
        language: String,
        score: i64,
        now: Timestamp,
    ) -> Self {
        Self {
            id: IntentId::generate(),
            key,
            contest,
            user,
            group,
            problem_index,
            code,
            language,
            score,
            completed_steps: Vec::new(),
            state: IntentState::Pending,
            attempts: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// First step not yet recorded.
    #[must_use]
    pub fn next_step(&self) -> Option<SagaStep> {
        SagaStep::ALL
            .into_iter()
            .find(|step| !self.completed_steps.contains(step))
    }

    /// Record `step` as landed. Completes the intent after the last step.
    pub fn mark(&mut self, step: SagaStep, now: Timestamp) {
        if !self.completed_steps.contains(&step) {
            self.completed_steps.push(step);
        }
        self.updated_at = now;
        if self.next_step().is_none() {
            self.state = IntentState::Completed;
            self.last_error = None;
        }
    }

    pub fn record_failure(&mut self, error: &str, now: Timestamp) {
        self.attempts += 1;
        self.last_error = Some(error.to_string());
        self.updated_at = now;
    }

    pub fn dead_letter(&mut self, now: Timestamp) {
        self.state = IntentState::DeadLettered;
        self.updated_at = now;
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state == IntentState::Pending
    }

    /// Key under which the user and group deltas are applied.
    #[must_use]
    pub fn operation_key(&self) -> OperationKey {
        OperationKey::from(self.id)
    }

    /// The record appended to the contest.
    #[must_use]
    pub fn submission(&self) -> Submission {
        Submission {
            intent_id: self.id,
            user: self.user.clone(),
            group: self.group.clone(),
            problem_index: self.problem_index,
            code: self.code.clone(),
            language: self.language.clone(),
            score: self.score,
            submitted_at: self.created_at,
        }
    }
}
