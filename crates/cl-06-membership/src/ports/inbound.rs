//! Driving ports: users and groups.

use crate::domain::{NewGroup, ProfileUpdate, Registration};
use async_trait::async_trait;
use shared_types::{Group, GroupId, PlatformResult, User, UserId};

#[async_trait]
pub trait UserApi: Send + Sync {
    /// Create an account with a zero coding score.
    ///
    /// # Errors
    /// `BadRequest` when the (lowercased) email is already registered.
    async fn register(&self, registration: Registration) -> PlatformResult<User>;

    /// Edit the caller's profile.
    async fn update_profile(&self, id: &UserId, update: ProfileUpdate) -> PlatformResult<User>;

    /// Cached lookup; absent when missing or when the store is degraded.
    async fn get_user(&self, id: &UserId) -> Option<User>;
}

/// Group membership.
///
/// A user's `groups` list and the group's `members` list are two documents;
/// every operation updates both and compensates the first if the second
/// fails.
#[async_trait]
pub trait GroupApi: Send + Sync {
    async fn create_group(&self, request: NewGroup) -> PlatformResult<Group>;

    async fn join_group(
        &self,
        group: &GroupId,
        user: &UserId,
        invite_code: Option<&str>,
    ) -> PlatformResult<Group>;

    async fn leave_group(&self, group: &GroupId, user: &UserId) -> PlatformResult<()>;

    /// # Errors
    /// `Unauthorized` unless `caller` created the group.
    async fn delete_group(&self, group: &GroupId, caller: &UserId) -> PlatformResult<()>;

    async fn get_group(&self, id: &GroupId) -> Option<Group>;

    /// Groups `user` belongs to, newest first.
    async fn groups_of(&self, user: &UserId) -> Vec<Group>;

    /// Public groups, newest first.
    async fn public_groups(&self) -> Vec<Group>;
}
