//! # Store Ports (Driven Ports)
//!
//! The core needs only point lookup, point write, lookup by a secondary field
//! and "top-N ordered by score". Every operation is atomic for one document;
//! nothing spans documents.

use crate::query::UserScope;
use async_trait::async_trait;
use shared_types::{
    Aggregate, Contest, ContestId, Group, OperationKey, Scored, StoreError, Submission, User,
};

/// Point CRUD for one aggregate type.
///
/// Versions are assigned by the store: `insert` stores version 1 and every
/// successful `replace` increments it.
#[async_trait]
pub trait DocumentStore<A: Aggregate>: Send + Sync {
    /// Point lookup.
    async fn get(&self, id: &A::Id) -> Result<Option<A>, StoreError>;

    /// Insert a new document.
    ///
    /// # Errors
    /// `Duplicate` if the id or a unique field is taken.
    async fn insert(&self, doc: A) -> Result<A, StoreError>;

    /// Replace a document if its stored version still equals `doc.version()`.
    ///
    /// # Errors
    /// `NotFound` if absent, `VersionConflict` if someone wrote in between.
    async fn replace(&self, doc: A) -> Result<A, StoreError>;

    /// Delete a document. Returns whether it existed.
    async fn delete(&self, id: &A::Id) -> Result<bool, StoreError>;

    /// All documents.
    async fn list(&self) -> Result<Vec<A>, StoreError>;
}

/// Result of an atomic score increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreApplied {
    /// Score after the call.
    pub new_total: i64,
    /// False when the operation key had already been applied.
    pub applied: bool,
}

/// Atomic, idempotent score increments.
#[async_trait]
pub trait ScoreStore<A: Scored>: DocumentStore<A> {
    /// Add `delta` to the score of `id` unless `op` was already applied.
    ///
    /// The check, the increment and the recording of `op` happen in one
    /// atomic document update.
    async fn apply_score_delta(
        &self,
        id: &A::Id,
        delta: i64,
        op: &OperationKey,
    ) -> Result<ScoreApplied, StoreError>;
}

/// Result of appending a submission to a contest.
#[derive(Debug, Clone)]
pub struct SubmissionAppend {
    pub contest: Contest,
    /// False when a submission with the same intent id was already present.
    pub appended: bool,
}

#[async_trait]
pub trait ContestStore: DocumentStore<Contest> {
    /// Append `submission` and add its score to the matching participating
    /// group, atomically. Idempotent per `submission.intent_id`.
    ///
    /// # Errors
    /// `NotFound` if the contest is missing or the group is not participating.
    async fn append_submission(
        &self,
        id: &ContestId,
        submission: Submission,
    ) -> Result<SubmissionAppend, StoreError>;
}

#[async_trait]
pub trait UserStore: ScoreStore<User> {
    /// Lookup by (lowercased) email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Highest scores within `scope`, score descending then id ascending.
    async fn top_users(&self, scope: &UserScope, n: usize) -> Result<Vec<User>, StoreError>;
}

#[async_trait]
pub trait GroupStore: ScoreStore<Group> {
    async fn find_by_invite_code(&self, code: &str) -> Result<Option<Group>, StoreError>;

    /// Highest group scores, score descending then id ascending.
    async fn top_groups(&self, n: usize) -> Result<Vec<Group>, StoreError>;
}
