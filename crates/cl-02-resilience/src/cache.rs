//! # Cache-Aside Layer
//!
//! Read-through cache per aggregate type, keyed by aggregate id.
//!
//! ## Invalidation
//!
//! - Update / delete of `id` drops `id`.
//! - Create follows [`CreateInvalidation`]: drop only the new key, or drop
//!   the whole region (every cached entry of that aggregate type).
//!
//! ## Stale fills
//!
//! A reader that misses takes a [`CacheTicket`] before loading from the store
//! and fills with [`CacheAside::put_if_fresh`]. Any invalidation of that key
//! or region in between bumps a generation counter and the fill is rejected,
//! so a slow load can never re-insert a pre-write snapshot after a write.

use async_trait::async_trait;
use parking_lot::RwLock;
use platform_telemetry::{CACHE_INVALIDATIONS, CACHE_LOOKUPS, CACHE_STALE_PUTS};
use shared_types::Aggregate;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::trace;

/// What a create invalidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CreateInvalidation {
    /// Drop only the created key.
    #[default]
    Key,
    /// Drop every entry of the aggregate type.
    Region,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Entries older than this are treated as misses. `None` disables expiry.
    pub ttl: Option<Duration>,
    /// Oldest entries are evicted beyond this size.
    pub max_entries: usize,
    pub create_invalidation: CreateInvalidation,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Some(Duration::from_secs(300)),
            max_entries: 10_000,
            create_invalidation: CreateInvalidation::Key,
        }
    }
}

/// Generation snapshot taken before a store load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTicket {
    region: u64,
    key: u64,
}

/// Cache-aside contract for one aggregate type.
#[async_trait]
pub trait CacheAside<A: Aggregate>: Send + Sync {
    async fn get(&self, id: &A::Id) -> Option<A>;

    /// Unconditional put.
    async fn put(&self, value: A);

    /// Snapshot generations for `id` before loading it.
    async fn ticket(&self, id: &A::Id) -> CacheTicket;

    /// Put only if nothing invalidated `value`'s key since `ticket`.
    async fn put_if_fresh(&self, ticket: CacheTicket, value: A) -> bool;

    async fn invalidate_key(&self, id: &A::Id);

    async fn invalidate_region(&self);

    /// Apply the configured create policy for a newly created `id`.
    async fn on_create(&self, id: &A::Id);
}

struct Entry<A> {
    value: A,
    stored_at: Instant,
}

struct Region<A: Aggregate> {
    entries: HashMap<A::Id, Entry<A>>,
    region_generation: u64,
    key_generations: HashMap<A::Id, u64>,
}

/// In-process cache for one aggregate type.
pub struct InMemoryCache<A: Aggregate> {
    region: RwLock<Region<A>>,
    config: CacheConfig,
}

impl<A: Aggregate> InMemoryCache<A> {
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            region: RwLock::new(Region {
                entries: HashMap::new(),
                region_generation: 0,
                key_generations: HashMap::new(),
            }),
            config,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.region.read().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(region: &mut Region<A>, value: A, max_entries: usize) {
        if region.entries.len() >= max_entries && !region.entries.contains_key(value.id()) {
            let oldest = region
                .entries
                .iter()
                .min_by_key(|(_, e)| e.stored_at)
                .map(|(id, _)| id.clone());
            if let Some(oldest) = oldest {
                region.entries.remove(&oldest);
            }
        }
        region.entries.insert(
            value.id().clone(),
            Entry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    fn label() -> &'static str {
        A::KIND.as_str()
    }
}

impl<A: Aggregate> Default for InMemoryCache<A> {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[async_trait]
impl<A: Aggregate> CacheAside<A> for InMemoryCache<A> {
    async fn get(&self, id: &A::Id) -> Option<A> {
        let hit = {
            let region = self.region.read();
            region.entries.get(id).and_then(|entry| match self.config.ttl {
                Some(ttl) if entry.stored_at.elapsed() > ttl => None,
                _ => Some(entry.value.clone()),
            })
        };
        let outcome = if hit.is_some() { "hit" } else { "miss" };
        CACHE_LOOKUPS.with_label_values(&[Self::label(), outcome]).inc();
        hit
    }

    async fn put(&self, value: A) {
        let mut region = self.region.write();
        Self::insert(&mut region, value, self.config.max_entries.max(1));
    }

    async fn ticket(&self, id: &A::Id) -> CacheTicket {
        let region = self.region.read();
        CacheTicket {
            region: region.region_generation,
            key: region.key_generations.get(id).copied().unwrap_or(0),
        }
    }

    async fn put_if_fresh(&self, ticket: CacheTicket, value: A) -> bool {
        let mut region = self.region.write();
        let current = CacheTicket {
            region: region.region_generation,
            key: region.key_generations.get(value.id()).copied().unwrap_or(0),
        };
        if current != ticket {
            trace!(region = Self::label(), id = %value.id(), "Rejected stale cache fill");
            CACHE_STALE_PUTS.with_label_values(&[Self::label()]).inc();
            return false;
        }
        Self::insert(&mut region, value, self.config.max_entries.max(1));
        true
    }

    async fn invalidate_key(&self, id: &A::Id) {
        let mut region = self.region.write();
        region.entries.remove(id);
        *region.key_generations.entry(id.clone()).or_insert(0) += 1;
        CACHE_INVALIDATIONS
            .with_label_values(&[Self::label(), "key"])
            .inc();
    }

    async fn invalidate_region(&self) {
        let mut region = self.region.write();
        region.entries.clear();
        region.key_generations.clear();
        region.region_generation += 1;
        CACHE_INVALIDATIONS
            .with_label_values(&[Self::label(), "region"])
            .inc();
    }

    async fn on_create(&self, id: &A::Id) {
        match self.config.create_invalidation {
            CreateInvalidation::Key => self.invalidate_key(id).await,
            CreateInvalidation::Region => self.invalidate_region().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use shared_types::{User, UserId};

    fn user(id: &str, score: i64) -> User {
        let mut u = User::new(UserId::new(id), id, format!("{id}@x.org"), "MIT", "CS", 0);
        u.coding_score = score;
        u
    }

    #[tokio::test]
    async fn test_put_then_get_round_trips() {
        let cache = InMemoryCache::<User>::default();
        cache.put(user("u1", 7)).await;
        assert_eq!(cache.get(&UserId::new("u1")).await, Some(user("u1", 7)));
    }

    #[tokio::test]
    async fn test_invalidate_key_drops_entry() {
        let cache = InMemoryCache::<User>::default();
        cache.put(user("u1", 7)).await;
        cache.put(user("u2", 3)).await;
        cache.invalidate_key(&UserId::new("u1")).await;
        assert!(cache.get(&UserId::new("u1")).await.is_none());
        assert!(cache.get(&UserId::new("u2")).await.is_some());
    }

    #[tokio::test]
    async fn test_region_policy_drops_everything_on_create() {
        let cache = InMemoryCache::<User>::new(CacheConfig {
            create_invalidation: CreateInvalidation::Region,
            ..CacheConfig::default()
        });
        cache.put(user("u1", 7)).await;
        cache.on_create(&UserId::new("u9")).await;
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_fill_after_invalidation_is_rejected() {
        let cache = InMemoryCache::<User>::default();
        let id = UserId::new("u1");

        // Reader takes a ticket and loads the old value...
        let ticket = cache.ticket(&id).await;
        // ...a writer commits and invalidates...
        cache.invalidate_key(&id).await;
        // ...and the reader's late fill must not land.
        assert!(!cache.put_if_fresh(ticket, user("u1", 0)).await);
        assert!(cache.get(&id).await.is_none());

        let ticket = cache.ticket(&id).await;
        assert!(cache.put_if_fresh(ticket, user("u1", 100)).await);
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let cache = InMemoryCache::<User>::new(CacheConfig {
            ttl: Some(Duration::from_millis(20)),
            ..CacheConfig::default()
        });
        cache.put(user("u1", 1)).await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(cache.get(&UserId::new("u1")).await.is_none());
    }

    #[tokio::test]
    async fn test_max_entries_evicts_oldest() {
        let cache = InMemoryCache::<User>::new(CacheConfig {
            max_entries: 2,
            ..CacheConfig::default()
        });
        cache.put(user("u1", 1)).await;
        tokio::time::sleep(Duration::from_millis(2)).await;
        cache.put(user("u2", 2)).await;
        tokio::time::sleep(Duration::from_millis(2)).await;
        cache.put(user("u3", 3)).await;
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&UserId::new("u1")).await.is_none());
    }

    proptest! {
        #[test]
        fn prop_put_then_get_returns_value(id in "[a-z]{1,8}", score in any::<i64>()) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let cache = InMemoryCache::<User>::default();
                cache.put(user(&id, score)).await;
                let got = cache.get(&UserId::new(id.clone())).await;
                prop_assert_eq!(got, Some(user(&id, score)));
                Ok(())
            })?;
        }

        #[test]
        fn prop_get_after_invalidate_is_miss(ids in proptest::collection::vec("[a-c]", 1..10)) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let cache = InMemoryCache::<User>::default();
                for id in &ids {
                    cache.put(user(id, 1)).await;
                }
                let target = UserId::new(ids[0].clone());
                cache.invalidate_key(&target).await;
                prop_assert!(cache.get(&target).await.is_none());
                Ok(())
            })?;
        }
    }
}
