//! # Service Container
//!
//! ## Construction Order
//!
//! ```text
//! Level 0: stores, event bus, clock, resilience guard
//! Level 1: one cache + reader per aggregate (shared by every service)
//! Level 2: ScoreAggregator, UserDirectory, LeaderboardService
//! Level 3: SubmissionProcessor, ContestLifecycle, GroupDirectory
//! ```
//!
//! Every service reading an aggregate holds a clone of the same reader, so
//! an invalidation by one service is seen by all of them.

use std::sync::Arc;

use tracing::info;

use cl_01_store::{
    ContestStore, GroupStore, InMemoryContestStore, InMemoryGroupStore, InMemoryUserStore,
    UserStore,
};
use cl_02_resilience::{ContestReader, GroupReader, InMemoryCache, ResilienceGuard, UserReader};
use cl_03_contest::{ContestLifecycle, InMemoryIntentStore, SubmissionProcessor};
use cl_04_scoring::ScoreAggregator;
use cl_05_leaderboard::LeaderboardService;
use cl_06_membership::{GroupDirectory, UserDirectory};
use shared_bus::InMemoryEventBus;
use shared_types::{Contest, Group, SystemTimeSource, TimeSource, User};

use crate::container::config::PlatformConfig;

pub struct ServiceContainer {
    pub config: PlatformConfig,

    // =========================================================================
    // LEVEL 0: infrastructure
    // =========================================================================
    pub user_store: Arc<InMemoryUserStore>,
    pub group_store: Arc<InMemoryGroupStore>,
    pub contest_store: Arc<InMemoryContestStore>,
    pub intent_store: Arc<InMemoryIntentStore>,
    pub bus: Arc<InMemoryEventBus>,
    pub time: Arc<dyn TimeSource>,
    pub guard: ResilienceGuard,

    // =========================================================================
    // LEVEL 1: cached readers
    // =========================================================================
    pub users: UserReader,
    pub groups: GroupReader,
    pub contests: ContestReader,

    // =========================================================================
    // LEVEL 2-3: services
    // =========================================================================
    pub scores: Arc<ScoreAggregator>,
    pub submissions: Arc<SubmissionProcessor>,
    pub contest_lifecycle: Arc<ContestLifecycle>,
    pub leaderboards: Arc<LeaderboardService>,
    pub user_directory: Arc<UserDirectory>,
    pub group_directory: Arc<GroupDirectory>,
}

impl ServiceContainer {
    /// Container on the system clock.
    pub fn new(config: PlatformConfig) -> Self {
        Self::with_time(config, Arc::new(SystemTimeSource))
    }

    /// Container on a caller-supplied clock.
    pub fn with_time(config: PlatformConfig, time: Arc<dyn TimeSource>) -> Self {
        info!("Initializing services");

        // Level 0
        let user_store = Arc::new(InMemoryUserStore::new());
        let group_store = Arc::new(InMemoryGroupStore::new());
        let contest_store = Arc::new(InMemoryContestStore::new());
        let intent_store = Arc::new(InMemoryIntentStore::new());
        let bus = Arc::new(InMemoryEventBus::with_capacity(config.bus.channel_capacity));
        let guard = ResilienceGuard::new(config.resilience.clone());

        // Level 1
        let users = {
            let store: Arc<dyn UserStore> = user_store.clone();
            UserReader::new(
                store,
                Arc::new(InMemoryCache::<User>::new(config.cache.clone())),
                guard.clone(),
            )
        };
        let groups = {
            let store: Arc<dyn GroupStore> = group_store.clone();
            GroupReader::new(
                store,
                Arc::new(InMemoryCache::<Group>::new(config.cache.clone())),
                guard.clone(),
            )
        };
        let contests = {
            let store: Arc<dyn ContestStore> = contest_store.clone();
            ContestReader::new(
                store,
                Arc::new(InMemoryCache::<Contest>::new(config.cache.clone())),
                guard.clone(),
            )
        };

        // Level 2
        let scores = Arc::new(ScoreAggregator::new(
            users.clone(),
            groups.clone(),
            bus.clone(),
            time.clone(),
        ));
        let user_directory = Arc::new(UserDirectory::new(users.clone(), bus.clone(), time.clone()));
        let leaderboards = Arc::new(LeaderboardService::new(
            users.clone(),
            groups.clone(),
            config.leaderboard.clone(),
        ));

        // Level 3
        let submissions = Arc::new(SubmissionProcessor::new(
            contests.clone(),
            users.clone(),
            scores.clone(),
            intent_store.clone(),
            bus.clone(),
            time.clone(),
            config.saga.clone(),
        ));
        let contest_lifecycle =
            Arc::new(ContestLifecycle::new(contests.clone(), bus.clone(), time.clone()));
        let group_directory = Arc::new(GroupDirectory::new(
            groups.clone(),
            users.clone(),
            bus.clone(),
            time.clone(),
        ));

        info!(
            call_timeout_ms = config.resilience.call_timeout.as_millis() as u64,
            failure_threshold = config.resilience.breaker.failure_threshold,
            cache_max_entries = config.cache.max_entries,
            "Services initialized"
        );

        Self {
            config,
            user_store,
            group_store,
            contest_store,
            intent_store,
            bus,
            time,
            guard,
            users,
            groups,
            contests,
            scores,
            submissions,
            contest_lifecycle,
            leaderboards,
            user_directory,
            group_directory,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cl_03_contest::ContestApi;
    use cl_06_membership::{GroupApi, NewGroup, Registration, UserApi};
    use shared_types::ContestId;

    #[tokio::test]
    async fn test_services_share_caches() {
        let container = ServiceContainer::new(PlatformConfig::default());
        let user = container
            .user_directory
            .register(Registration {
                name: "Ada".into(),
                email: "ada@x.org".into(),
                college: "MIT".into(),
                department: "CS".into(),
                year: None,
            })
            .await
            .unwrap();

        // Warm the user cache through the shared reader.
        assert!(container.users.get_by_id(&user.id).await.is_some());

        let group = container
            .group_directory
            .create_group(NewGroup {
                name: "Algo".into(),
                description: String::new(),
                creator: user.id.clone(),
                allowed_emails: vec![],
                is_private: false,
            })
            .await
            .unwrap();

        // The directory's write invalidated the entry every service reads.
        let cached = container.users.get_by_id(&user.id).await.unwrap();
        assert!(cached.is_member_of(&group.id));
    }

    #[tokio::test]
    async fn test_missing_contest_reads_absent() {
        let container = ServiceContainer::new(PlatformConfig::default());
        assert!(container
            .contest_lifecycle
            .get_contest(&ContestId::new("nope"))
            .await
            .is_none());
    }
}
