//! Driving port: leaderboard queries.

use crate::domain::{BoardScope, GroupBoard, Rank, UserBoard};
use async_trait::async_trait;
use cl_01_store::UserScope;
use shared_types::{Group, PlatformResult, User, UserId};

/// Leaderboard Query Engine.
///
/// Ranks are only meaningful inside the window returned with them. A user
/// below the window is reported as [`Rank::NotRanked`].
#[async_trait]
pub trait LeaderboardApi: Send + Sync {
    /// Top `n` users in `scope`, score descending then id ascending.
    /// Empty when the user store is degraded.
    async fn top_users(&self, scope: &UserScope, n: usize) -> Vec<User>;

    /// Top `n` groups, score descending then id ascending.
    /// Empty when the group store is degraded.
    async fn top_groups(&self, n: usize) -> Vec<Group>;

    /// Caller's position inside the `scope` window.
    async fn rank_of(&self, caller: &UserId, scope: &UserScope) -> Rank;

    /// User board for `scope` with the caller's own summary.
    ///
    /// # Errors
    /// `NotFound` when the caller does not exist.
    async fn user_board(&self, caller: &UserId, scope: BoardScope) -> PlatformResult<UserBoard>;

    /// Group board with member summaries.
    async fn group_board(&self) -> PlatformResult<GroupBoard>;
}
