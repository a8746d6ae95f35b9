//! In-memory document stores.
//!
//! One `InMemoryStore<A>` per aggregate type. Every operation takes the
//! store's write lock for its whole read-check-write, which gives the same
//! single-document atomicity a document database offers and nothing more.
//!
//! Score deltas are deduplicated by operation key per document. Keys are
//! kept for `op_retention` after they were applied, then forgotten: a
//! duplicate delta only arrives while its intent is still being driven or
//! replayed, which is minutes, so a day of history bounds the ledger
//! without ever letting a live retry through.

use super::fault::{Access, FaultInjector};
use crate::ports::{
    ContestStore, DocumentStore, GroupStore, ScoreApplied, ScoreStore, SubmissionAppend, UserStore,
};
use crate::query::{rank_order, UserScope};
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{
    Aggregate, AggregateKind, Contest, ContestId, Group, OperationKey, Scored, StoreError,
    Submission, User,
};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::trace;

/// How long an applied operation key is remembered.
pub const DEFAULT_OP_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Fields that must be unique across all documents of a type.
pub trait Indexed: Aggregate {
    fn unique_keys(&self) -> Vec<(&'static str, String)>;
}

impl Indexed for User {
    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![("email", self.email.clone())]
    }
}

impl Indexed for Group {
    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![("invite_code", self.invite_code.clone())]
    }
}

impl Indexed for Contest {
    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }
}

/// Operation keys applied to one document, oldest first.
#[derive(Default)]
struct OpLedger {
    seen: HashSet<OperationKey>,
    order: VecDeque<(Instant, OperationKey)>,
}

impl OpLedger {
    fn contains(&self, op: &OperationKey) -> bool {
        self.seen.contains(op)
    }

    fn record(&mut self, op: OperationKey) {
        if self.seen.insert(op.clone()) {
            self.order.push_back((Instant::now(), op));
        }
    }

    fn prune(&mut self, retention: Duration) {
        let Some(cutoff) = Instant::now().checked_sub(retention) else {
            return;
        };
        while let Some((at, _)) = self.order.front() {
            if *at >= cutoff {
                break;
            }
            if let Some((_, op)) = self.order.pop_front() {
                self.seen.remove(&op);
            }
        }
    }

    fn len(&self) -> usize {
        self.seen.len()
    }
}

struct Inner<A: Aggregate> {
    docs: BTreeMap<A::Id, A>,
    /// Operation keys already applied, stored alongside each document.
    applied: HashMap<A::Id, OpLedger>,
}

/// In-memory store for one aggregate type.
pub struct InMemoryStore<A: Aggregate> {
    inner: RwLock<Inner<A>>,
    faults: Arc<FaultInjector>,
    op_retention: Duration,
}

pub type InMemoryUserStore = InMemoryStore<User>;
pub type InMemoryGroupStore = InMemoryStore<Group>;
pub type InMemoryContestStore = InMemoryStore<Contest>;

impl<A: Indexed> InMemoryStore<A> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                docs: BTreeMap::new(),
                applied: HashMap::new(),
            }),
            faults: Arc::new(FaultInjector::new(A::KIND)),
            op_retention: DEFAULT_OP_RETENTION,
        }
    }

    #[must_use]
    pub fn with_op_retention(mut self, retention: Duration) -> Self {
        self.op_retention = retention;
        self
    }

    /// Operation keys currently remembered for `id`.
    #[must_use]
    pub fn applied_ops(&self, id: &A::Id) -> usize {
        self.inner.read().applied.get(id).map_or(0, OpLedger::len)
    }

    /// Fault switch for this store.
    #[must_use]
    pub fn faults(&self) -> Arc<FaultInjector> {
        self.faults.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().docs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read a document bypassing fault injection.
    #[must_use]
    pub fn snapshot(&self, id: &A::Id) -> Option<A> {
        self.inner.read().docs.get(id).cloned()
    }

    fn check_unique(inner: &Inner<A>, doc: &A) -> Result<(), StoreError> {
        for (field, value) in doc.unique_keys() {
            let taken = inner.docs.values().any(|other| {
                other.id() != doc.id()
                    && other
                        .unique_keys()
                        .iter()
                        .any(|(f, v)| *f == field && *v == value)
            });
            if taken {
                return Err(StoreError::Duplicate {
                    kind: A::KIND,
                    field,
                    value,
                });
            }
        }
        Ok(())
    }
}

impl<A: Indexed> Default for InMemoryStore<A> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<A: Indexed> DocumentStore<A> for InMemoryStore<A> {
    async fn get(&self, id: &A::Id) -> Result<Option<A>, StoreError> {
        self.faults.before(Access::Read).await?;
        Ok(self.inner.read().docs.get(id).cloned())
    }

    async fn insert(&self, mut doc: A) -> Result<A, StoreError> {
        self.faults.before(Access::Write).await?;
        let mut inner = self.inner.write();
        if inner.docs.contains_key(doc.id()) {
            return Err(StoreError::Duplicate {
                kind: A::KIND,
                field: "id",
                value: doc.id().to_string(),
            });
        }
        Self::check_unique(&inner, &doc)?;
        doc.set_version(1);
        inner.docs.insert(doc.id().clone(), doc.clone());
        trace!(kind = %A::KIND, id = %doc.id(), "Document inserted");
        Ok(doc)
    }

    async fn replace(&self, mut doc: A) -> Result<A, StoreError> {
        self.faults.before(Access::Write).await?;
        let mut inner = self.inner.write();
        let actual = inner
            .docs
            .get(doc.id())
            .map(Aggregate::version)
            .ok_or_else(|| StoreError::not_found(A::KIND, doc.id()))?;
        if actual != doc.version() {
            return Err(StoreError::VersionConflict {
                kind: A::KIND,
                id: doc.id().to_string(),
                expected: doc.version(),
                actual,
            });
        }
        Self::check_unique(&inner, &doc)?;
        doc.set_version(actual + 1);
        inner.docs.insert(doc.id().clone(), doc.clone());
        Ok(doc)
    }

    async fn delete(&self, id: &A::Id) -> Result<bool, StoreError> {
        self.faults.before(Access::Write).await?;
        let mut inner = self.inner.write();
        inner.applied.remove(id);
        Ok(inner.docs.remove(id).is_some())
    }

    async fn list(&self) -> Result<Vec<A>, StoreError> {
        self.faults.before(Access::Read).await?;
        Ok(self.inner.read().docs.values().cloned().collect())
    }
}

#[async_trait]
impl<A: Indexed + Scored> ScoreStore<A> for InMemoryStore<A> {
    async fn apply_score_delta(
        &self,
        id: &A::Id,
        delta: i64,
        op: &OperationKey,
    ) -> Result<ScoreApplied, StoreError> {
        self.faults.before(Access::Write).await?;
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let doc = inner
            .docs
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found(A::KIND, id))?;
        let applied = inner.applied.entry(id.clone()).or_default();
        applied.prune(self.op_retention);

        if applied.contains(op) {
            return Ok(ScoreApplied {
                new_total: doc.score(),
                applied: false,
            });
        }

        let new_total = doc.score().saturating_add(delta);
        doc.set_score(new_total);
        doc.set_version(doc.version() + 1);
        applied.record(op.clone());
        Ok(ScoreApplied {
            new_total,
            applied: true,
        })
    }
}

#[async_trait]
impl ContestStore for InMemoryStore<Contest> {
    async fn append_submission(
        &self,
        id: &ContestId,
        submission: Submission,
    ) -> Result<SubmissionAppend, StoreError> {
        self.faults.before(Access::Write).await?;
        let mut inner = self.inner.write();
        let contest = inner
            .docs
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found(AggregateKind::Contest, id))?;

        if contest.has_submission(&submission.intent_id) {
            return Ok(SubmissionAppend {
                contest: contest.clone(),
                appended: false,
            });
        }

        let entry = contest
            .participating_groups
            .iter_mut()
            .find(|pg| pg.group == submission.group)
            .ok_or_else(|| StoreError::not_found(AggregateKind::Group, &submission.group))?;
        entry.score = entry.score.saturating_add(submission.score);
        contest.submissions.push(submission);
        contest.version += 1;

        Ok(SubmissionAppend {
            contest: contest.clone(),
            appended: true,
        })
    }
}

#[async_trait]
impl UserStore for InMemoryStore<User> {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.faults.before(Access::Read).await?;
        let email = email.to_lowercase();
        Ok(self
            .inner
            .read()
            .docs
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn top_users(&self, scope: &UserScope, n: usize) -> Result<Vec<User>, StoreError> {
        self.faults.before(Access::Read).await?;
        let mut users: Vec<User> = self
            .inner
            .read()
            .docs
            .values()
            .filter(|u| scope.contains(u))
            .cloned()
            .collect();
        users.sort_by(rank_order);
        users.truncate(n);
        Ok(users)
    }
}

#[async_trait]
impl GroupStore for InMemoryStore<Group> {
    async fn find_by_invite_code(&self, code: &str) -> Result<Option<Group>, StoreError> {
        self.faults.before(Access::Read).await?;
        Ok(self
            .inner
            .read()
            .docs
            .values()
            .find(|g| g.invite_code == code)
            .cloned())
    }

    async fn top_groups(&self, n: usize) -> Result<Vec<Group>, StoreError> {
        self.faults.before(Access::Read).await?;
        let mut groups: Vec<Group> = self.inner.read().docs.values().cloned().collect();
        groups.sort_by(rank_order);
        groups.truncate(n);
        Ok(groups)
    }
}
