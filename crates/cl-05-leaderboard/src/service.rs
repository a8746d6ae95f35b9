//! Leaderboard service.
//!
//! Windows are fetched straight from the stores' ordered queries through the
//! resilience guard. A degraded store yields an empty window flagged
//! `degraded` instead of an error. The caller's own record goes through the
//! cached point reader.

use crate::domain::{
    rank_within, BoardScope, GroupBoard, GroupEntry, MemberSummary, Rank, UserBoard,
};
use crate::ports::inbound::LeaderboardApi;
use async_trait::async_trait;
use cl_01_store::{GroupStore, UserScope, UserStore};
use cl_02_resilience::{GroupReader, Lookup, UserReader};
use platform_telemetry::LEADERBOARD_QUERIES;
use serde::{Deserialize, Serialize};
use shared_types::{AggregateKind, Group, PlatformError, PlatformResult, User, UserId};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Window sizes for the boards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardConfig {
    /// Users per board.
    pub user_window: usize,
    /// Groups on the group board.
    pub group_window: usize,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            user_window: 100,
            group_window: 50,
        }
    }
}

pub struct LeaderboardService {
    users: UserReader,
    groups: GroupReader,
    config: LeaderboardConfig,
}

impl LeaderboardService {
    pub fn new(users: UserReader, groups: GroupReader, config: LeaderboardConfig) -> Self {
        Self {
            users,
            groups,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &LeaderboardConfig {
        &self.config
    }

    fn record(board: &str, degraded: bool) {
        let outcome = if degraded { "degraded" } else { "ok" };
        LEADERBOARD_QUERIES.with_label_values(&[board, outcome]).inc();
    }

    /// Ordered user window plus whether it is a fallback.
    async fn fetch_users(&self, scope: &UserScope, n: usize) -> PlatformResult<(Vec<User>, bool)> {
        let dependency = AggregateKind::User.dependency_name();
        let store = self.users.store();
        match self
            .users
            .guard()
            .execute(dependency, store.top_users(scope, n))
            .await
        {
            Ok(result) => Ok((result?, false)),
            Err(degraded) => {
                warn!(%scope, reason = %degraded, "User leaderboard degraded");
                Ok((Vec::new(), true))
            }
        }
    }

    async fn fetch_groups(&self, n: usize) -> PlatformResult<(Vec<Group>, bool)> {
        let dependency = AggregateKind::Group.dependency_name();
        let store = self.groups.store();
        match self
            .groups
            .guard()
            .execute(dependency, store.top_groups(n))
            .await
        {
            Ok(result) => Ok((result?, false)),
            Err(degraded) => {
                warn!(reason = %degraded, "Group leaderboard degraded");
                Ok((Vec::new(), true))
            }
        }
    }

    /// Resolve a caller-relative scope. `None` when it depends on a caller
    /// record that could not be read.
    fn resolve(scope: &BoardScope, caller: Option<&User>) -> Option<UserScope> {
        match (scope, caller) {
            (BoardScope::Global, _) => Some(UserScope::Global),
            (BoardScope::College, Some(me)) => Some(UserScope::College(me.college.clone())),
            (BoardScope::Department(department), Some(me)) => {
                let department = if department.is_empty() {
                    me.department.clone()
                } else {
                    department.clone()
                };
                Some(UserScope::CollegeDepartment {
                    college: me.college.clone(),
                    department,
                })
            }
            _ => None,
        }
    }
}

#[async_trait]
impl LeaderboardApi for LeaderboardService {
    async fn top_users(&self, scope: &UserScope, n: usize) -> Vec<User> {
        self.fetch_users(scope, n)
            .await
            .map(|(top, _)| top)
            .unwrap_or_default()
    }

    async fn top_groups(&self, n: usize) -> Vec<Group> {
        self.fetch_groups(n)
            .await
            .map(|(top, _)| top)
            .unwrap_or_default()
    }

    async fn rank_of(&self, caller: &UserId, scope: &UserScope) -> Rank {
        let top = self.top_users(scope, self.config.user_window).await;
        rank_within(&top, caller)
    }

    async fn user_board(&self, caller: &UserId, scope: BoardScope) -> PlatformResult<UserBoard> {
        let window = self.config.user_window;
        let me = match self.users.lookup(caller).await {
            Lookup::Found(user) => Some(user),
            Lookup::Absent => return Err(PlatformError::not_found(AggregateKind::User, caller)),
            Lookup::Unavailable => None,
        };

        let Some(user_scope) = Self::resolve(&scope, me.as_ref()) else {
            Self::record(scope.as_str(), true);
            return Ok(UserBoard::new(window, &[], None, true));
        };

        let (top, degraded) = self.fetch_users(&user_scope, window).await?;
        // Prefer the window's copy of the caller: it came from the store.
        let me = me.map(|cached| {
            top.iter()
                .find(|u| u.id == cached.id)
                .cloned()
                .unwrap_or(cached)
        });
        let degraded = degraded || me.is_none();

        let board = UserBoard::new(window, &top, me.as_ref(), degraded);
        debug!(
            %caller,
            scope = %user_scope,
            entries = board.entries.len(),
            rank = ?board.caller.as_ref().map(|c| c.rank),
            "User leaderboard served"
        );
        Self::record(scope.as_str(), degraded);
        Ok(board)
    }

    async fn group_board(&self) -> PlatformResult<GroupBoard> {
        let window = self.config.group_window;
        let (top, degraded) = self.fetch_groups(window).await?;

        let mut seen: HashMap<UserId, Option<User>> = HashMap::new();
        let mut entries = Vec::with_capacity(top.len());
        for (index, group) in top.iter().enumerate() {
            let mut members = Vec::with_capacity(group.members.len());
            for member in &group.members {
                if !seen.contains_key(&member.user) {
                    let user = self.users.get_by_id(&member.user).await;
                    seen.insert(member.user.clone(), user);
                }
                let user = seen.get(&member.user).and_then(Option::as_ref);
                members.push(MemberSummary {
                    user: member.user.clone(),
                    role: member.role,
                    name: user.map(|u| u.name.clone()),
                    coding_score: user.map(|u| u.coding_score),
                });
            }
            entries.push(GroupEntry::new(index + 1, group, members));
        }

        debug!(entries = entries.len(), degraded, "Group leaderboard served");
        Self::record("group", degraded);
        Ok(GroupBoard {
            window,
            entries,
            degraded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cl_01_store::{DocumentStore, InMemoryGroupStore, InMemoryUserStore};
    use cl_02_resilience::{InMemoryCache, ResilienceGuard};
    use shared_types::{GroupId, GroupMember, MemberRole};
    use std::sync::Arc;

    struct Fixture {
        service: LeaderboardService,
        users: Arc<InMemoryUserStore>,
        groups: Arc<InMemoryGroupStore>,
        guard: ResilienceGuard,
    }

    fn fixture() -> Fixture {
        let users = Arc::new(InMemoryUserStore::new());
        let groups = Arc::new(InMemoryGroupStore::new());
        let guard = ResilienceGuard::default();
        let user_store: Arc<dyn UserStore> = users.clone();
        let group_store: Arc<dyn GroupStore> = groups.clone();
        let service = LeaderboardService::new(
            UserReader::new(user_store, Arc::new(InMemoryCache::<User>::default()), guard.clone()),
            GroupReader::new(
                group_store,
                Arc::new(InMemoryCache::<Group>::default()),
                guard.clone(),
            ),
            LeaderboardConfig::default(),
        );
        Fixture {
            service,
            users,
            groups,
            guard,
        }
    }

    async fn add_user(f: &Fixture, id: &str, score: i64, college: &str, dept: &str) {
        let mut u = User::new(UserId::new(id), id, format!("{id}@x.org"), college, dept, 0);
        u.coding_score = score;
        f.users.insert(u).await.unwrap();
    }

    #[tokio::test]
    async fn test_caller_at_150_is_not_ranked() {
        let f = fixture();
        for i in 0..150 {
            add_user(&f, &format!("u{i:03}"), 1_000 - i, "MIT", "CS").await;
        }
        let caller = UserId::new("u149");

        let board = f.service.user_board(&caller, BoardScope::Global).await.unwrap();
        assert_eq!(board.entries.len(), 100);
        assert!(!board.degraded);
        let me = board.caller.unwrap();
        assert_eq!(me.rank, Rank::NotRanked);
        assert_eq!(me.coding_score, 851);

        let board = f
            .service
            .user_board(&UserId::new("u099"), BoardScope::Global)
            .await
            .unwrap();
        assert_eq!(board.caller.unwrap().rank, Rank::Position(100));
    }

    #[tokio::test]
    async fn test_ties_break_by_id() {
        let f = fixture();
        add_user(&f, "carol", 50, "MIT", "CS").await;
        add_user(&f, "alice", 50, "MIT", "CS").await;
        add_user(&f, "bob", 70, "MIT", "CS").await;

        let top = f.service.top_users(&UserScope::Global, 10).await;
        let ids: Vec<&str> = top.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["bob", "alice", "carol"]);
        assert_eq!(
            f.service.rank_of(&UserId::new("carol"), &UserScope::Global).await,
            Rank::Position(3)
        );
    }

    #[tokio::test]
    async fn test_college_and_department_scopes_follow_caller() {
        let f = fixture();
        add_user(&f, "me", 10, "MIT", "CS").await;
        add_user(&f, "peer", 20, "MIT", "EE").await;
        add_user(&f, "other", 99, "CMU", "CS").await;
        let me = UserId::new("me");

        let college = f.service.user_board(&me, BoardScope::College).await.unwrap();
        assert_eq!(college.entries.len(), 2);
        assert_eq!(college.caller.unwrap().rank, Rank::Position(2));

        let ee = f
            .service
            .user_board(&me, BoardScope::Department("EE".into()))
            .await
            .unwrap();
        assert_eq!(ee.entries.len(), 1);
        assert_eq!(ee.caller.unwrap().rank, Rank::NotRanked);

        let own = f
            .service
            .user_board(&me, BoardScope::Department(String::new()))
            .await
            .unwrap();
        assert_eq!(own.entries[0].id, me);
    }

    #[tokio::test]
    async fn test_unknown_caller_is_not_found() {
        let f = fixture();
        let err = f
            .service
            .user_board(&UserId::new("ghost"), BoardScope::Global)
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_open_circuit_serves_degraded_board() {
        let f = fixture();
        add_user(&f, "me", 10, "MIT", "CS").await;
        f.guard.breakers().force_open("userService");

        let board = f
            .service
            .user_board(&UserId::new("me"), BoardScope::College)
            .await
            .unwrap();
        assert!(board.degraded);
        assert!(board.entries.is_empty());
        assert!(board.caller.is_none());
        assert!(f.service.top_users(&UserScope::Global, 5).await.is_empty());
    }

    #[tokio::test]
    async fn test_group_board_summarises_members() {
        let f = fixture();
        add_user(&f, "ada", 40, "MIT", "CS").await;
        let mut top = Group::new(GroupId::new("g1"), "Algo", UserId::new("ada"), "AAAAAAAAAAAA", 0);
        top.group_score = 300;
        top.members.push(GroupMember {
            user: UserId::new("gone"),
            role: MemberRole::Member,
            joined_at: 0,
        });
        let mut low = Group::new(GroupId::new("g2"), "Graphs", UserId::new("ada"), "BBBBBBBBBBBB", 0);
        low.group_score = 10;
        f.groups.insert(low).await.unwrap();
        f.groups.insert(top).await.unwrap();

        let board = f.service.group_board().await.unwrap();
        assert_eq!(board.window, 50);
        assert_eq!(board.entries.len(), 2);
        let first = &board.entries[0];
        assert_eq!((first.rank, first.id.as_str()), (1, "g1"));
        assert_eq!(first.members[0].name.as_deref(), Some("ada"));
        assert_eq!(first.members[0].coding_score, Some(40));
        assert_eq!(first.members[0].role, MemberRole::Admin);
        assert!(first.members[1].name.is_none());
    }

    #[tokio::test]
    async fn test_group_board_degraded_when_open() {
        let f = fixture();
        f.guard.breakers().force_open("groupService");
        let board = f.service.group_board().await.unwrap();
        assert!(board.degraded);
        assert!(board.entries.is_empty());
    }
}
