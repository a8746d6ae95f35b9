//! Driving ports: submissions and contest lifecycle.

use crate::domain::IntentState;
use async_trait::async_trait;
use shared_types::{
    Contest, ContestId, ContestStatus, GroupId, IntentId, PlatformResult, Problem, Timestamp,
    UserId,
};

/// A solution submitted by a known caller.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub contest_id: ContestId,
    pub user_id: UserId,
    pub problem_index: usize,
    pub code: String,
    pub language: String,
    /// Client-chosen retry key. Derived from the request fields when absent.
    pub idempotency_key: Option<String>,
}

/// Answer to a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub intent_id: IntentId,
    pub contest_id: ContestId,
    pub group_id: GroupId,
    pub score: i64,
    /// True when this request repeated an earlier one; nothing was applied twice.
    pub replayed: bool,
    pub state: IntentState,
}

/// What one recovery sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub scanned: usize,
    pub recovered: usize,
    pub still_pending: usize,
    pub dead_lettered: usize,
}

#[async_trait]
pub trait SubmissionApi: Send + Sync {
    /// Accept a submission and apply its score to contest, user and group.
    ///
    /// # Errors
    /// - `NotFound`: contest or user missing
    /// - `ContestNotActive`: outside `[start, end)`
    /// - `BadRequest`: not in a participating group, bad problem index
    /// - `ServiceUnavailable`: a store is degraded; the intent stays pending
    ///   and a retry with the same key resumes it
    async fn submit(&self, request: SubmitRequest) -> PlatformResult<SubmissionReceipt>;

    /// Drive the remaining steps of a pending intent.
    async fn resume(&self, intent_id: &IntentId) -> PlatformResult<SubmissionReceipt>;

    /// Retry stale pending intents; dead-letter those out of attempts.
    async fn recover_incomplete(&self) -> PlatformResult<RecoveryReport>;
}

/// Contest creation request.
#[derive(Debug, Clone)]
pub struct NewContest {
    pub title: String,
    pub description: String,
    pub creator: UserId,
    pub start_time: Timestamp,
    pub duration_minutes: u32,
    pub participating_groups: Vec<GroupId>,
    pub problems: Vec<Problem>,
}

#[async_trait]
pub trait ContestApi: Send + Sync {
    async fn create_contest(&self, request: NewContest) -> PlatformResult<Contest>;

    /// Cached read with live status. Absent when missing or degraded.
    async fn get_contest(&self, id: &ContestId) -> Option<Contest>;

    /// All contests, newest start first, with live status. Empty when degraded.
    async fn list_contests(&self) -> Vec<Contest>;

    /// Only the creator may delete.
    async fn delete_contest(&self, id: &ContestId, caller: &UserId) -> PlatformResult<()>;

    /// Persist the live status if it moved forward. Returns the stored status.
    async fn refresh_status(&self, id: &ContestId) -> PlatformResult<ContestStatus>;
}
