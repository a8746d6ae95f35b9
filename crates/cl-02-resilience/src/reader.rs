//! Cache-aside point reads through the resilience guard.
//!
//! ```text
//!   lookup(id) ──> cache.get ──hit──> Found
//!                     │ miss
//!                     ▼
//!               ticket = cache.ticket(id)
//!               guard.execute(store.get(id))
//!                     ├── Some(a) ──> cache.put_if_fresh(ticket, a), Found
//!                     ├── None    ──> Absent
//!                     └── degraded ─> Unavailable
//! ```

use crate::cache::CacheAside;
use crate::guard::ResilienceGuard;
use cl_01_store::{ContestStore, DocumentStore, GroupStore, UserStore};
use shared_types::{Aggregate, Contest, Group, PlatformError, User};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, warn};

/// Differentiated point-lookup result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<A> {
    Found(A),
    Absent,
    /// The store is degraded; the document may or may not exist.
    Unavailable,
}

impl<A> Lookup<A> {
    /// Collapse to the public get-by-id shape, where "down" reads as absent.
    pub fn into_option(self) -> Option<A> {
        match self {
            Lookup::Found(a) => Some(a),
            Lookup::Absent | Lookup::Unavailable => None,
        }
    }

    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Lookup::Unavailable)
    }
}

pub type UserReader = ResilientReader<User, dyn UserStore>;
pub type GroupReader = ResilientReader<Group, dyn GroupStore>;
pub type ContestReader = ResilientReader<Contest, dyn ContestStore>;

/// Store + cache + guard for one aggregate type.
pub struct ResilientReader<A, S>
where
    A: Aggregate,
    S: DocumentStore<A> + ?Sized,
{
    store: Arc<S>,
    cache: Arc<dyn CacheAside<A>>,
    guard: ResilienceGuard,
    _aggregate: PhantomData<fn() -> A>,
}

impl<A, S> Clone for ResilientReader<A, S>
where
    A: Aggregate,
    S: DocumentStore<A> + ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
            guard: self.guard.clone(),
            _aggregate: PhantomData,
        }
    }
}

impl<A, S> ResilientReader<A, S>
where
    A: Aggregate,
    S: DocumentStore<A> + ?Sized,
{
    pub fn new(store: Arc<S>, cache: Arc<dyn CacheAside<A>>, guard: ResilienceGuard) -> Self {
        Self {
            store,
            cache,
            guard,
            _aggregate: PhantomData,
        }
    }

    fn dependency() -> &'static str {
        A::KIND.dependency_name()
    }

    pub async fn lookup(&self, id: &A::Id) -> Lookup<A> {
        if let Some(hit) = self.cache.get(id).await {
            return Lookup::Found(hit);
        }

        let ticket = self.cache.ticket(id).await;
        match self.guard.execute(Self::dependency(), self.store.get(id)).await {
            Ok(Ok(Some(doc))) => {
                self.cache.put_if_fresh(ticket, doc.clone()).await;
                Lookup::Found(doc)
            }
            Ok(Ok(None)) => Lookup::Absent,
            Ok(Err(e)) => {
                warn!(kind = %A::KIND, %id, error = %e, "Unexpected store error on lookup");
                Lookup::Unavailable
            }
            Err(degraded) => {
                debug!(kind = %A::KIND, %id, reason = %degraded, "Lookup degraded");
                Lookup::Unavailable
            }
        }
    }

    /// Public get-by-id: absent when missing *or* when the store is degraded.
    pub async fn get_by_id(&self, id: &A::Id) -> Option<A> {
        self.lookup(id).await.into_option()
    }

    /// Lookup for write paths: missing is `NotFound`, degraded is
    /// `ServiceUnavailable`.
    pub async fn require(&self, id: &A::Id) -> Result<A, PlatformError> {
        match self.lookup(id).await {
            Lookup::Found(doc) => Ok(doc),
            Lookup::Absent => Err(PlatformError::not_found(A::KIND, id)),
            Lookup::Unavailable => Err(PlatformError::unavailable(
                A::KIND,
                "store degraded during lookup",
            )),
        }
    }

    /// Full listing; empty when the store is degraded.
    pub async fn list(&self) -> Vec<A> {
        self.guard
            .read(Self::dependency(), self.store.list(), Vec::new)
            .await
            .unwrap_or_default()
    }

    /// Drop `id` after an update or delete.
    pub async fn invalidate(&self, id: &A::Id) {
        self.cache.invalidate_key(id).await;
    }

    /// Apply the create policy after inserting `id`.
    pub async fn on_create(&self, id: &A::Id) {
        self.cache.on_create(id).await;
    }

    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<dyn CacheAside<A>> {
        &self.cache
    }

    #[must_use]
    pub fn guard(&self) -> &ResilienceGuard {
        &self.guard
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::guard::ResilienceConfig;
    use cl_01_store::{FaultMode, FaultScope, InMemoryUserStore, ScoreStore};
    use shared_types::{OperationKey, User, UserId};

    async fn setup() -> ResilientReader<User, InMemoryUserStore> {
        let store = Arc::new(InMemoryUserStore::new());
        store
            .insert(User::new(UserId::new("u1"), "Ada", "ada@x.org", "MIT", "CS", 0))
            .await
            .unwrap();
        ResilientReader::new(
            store,
            Arc::new(InMemoryCache::<User>::default()),
            ResilienceGuard::new(ResilienceConfig::default()),
        )
    }

    #[tokio::test]
    async fn test_found_absent() {
        let reader = setup().await;
        assert!(matches!(reader.lookup(&UserId::new("u1")).await, Lookup::Found(_)));
        assert_eq!(reader.lookup(&UserId::new("nope")).await, Lookup::Absent);
    }

    #[tokio::test]
    async fn test_open_circuit_reads_absent_not_error() {
        let reader = setup().await;
        reader.guard().breakers().force_open("userService");
        assert_eq!(reader.lookup(&UserId::new("u1")).await, Lookup::Unavailable);
        assert!(reader.get_by_id(&UserId::new("u1")).await.is_none());
    }

    #[tokio::test]
    async fn test_require_distinguishes_down_from_missing() {
        let reader = setup().await;
        let missing = reader.require(&UserId::new("nope")).await.unwrap_err();
        assert!(matches!(missing, PlatformError::NotFound { .. }));

        reader.store().faults().set(FaultMode::Failing, FaultScope::Reads);
        let down = reader.require(&UserId::new("u1")).await.unwrap_err();
        assert!(matches!(down, PlatformError::ServiceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_write_then_read_sees_update() {
        let reader = setup().await;
        let id = UserId::new("u1");
        assert_eq!(reader.get_by_id(&id).await.unwrap().coding_score, 0);

        reader
            .store()
            .apply_score_delta(&id, 100, &OperationKey::new("op-1"))
            .await
            .unwrap();
        reader.invalidate(&id).await;

        assert_eq!(reader.get_by_id(&id).await.unwrap().coding_score, 100);
    }

    #[tokio::test]
    async fn test_list_falls_back_to_empty() {
        let reader = setup().await;
        assert_eq!(reader.list().await.len(), 1);
        reader.store().faults().set(FaultMode::Failing, FaultScope::All);
        assert!(reader.list().await.is_empty());
    }
}
