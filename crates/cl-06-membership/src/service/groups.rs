//! Group membership.
//!
//! Membership lives in two documents: `Group.members` and `User.groups`.
//! Each side is edited with a version-checked update. The group side is
//! written first; if the user side then fails, the group edit is reverted
//! before the error is returned.

use crate::domain::{check_join, check_leave, generate_invite_code, NewGroup};
use crate::ports::inbound::GroupApi;
use async_trait::async_trait;
use cl_01_store::{update_with_retry, DocumentStore, Mutation, DEFAULT_CAS_ATTEMPTS};
use cl_02_resilience::{GroupReader, UserReader};
use shared_bus::{EventEnvelope, EventPublisher, PlatformEvent};
use shared_types::{
    AggregateKind, Group, GroupId, GroupMember, MemberRole, PlatformError, PlatformResult,
    TimeSource, User, UserId,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Fresh invite codes tried before giving up on a create.
pub const INVITE_CODE_ATTEMPTS: u32 = 3;

pub struct GroupDirectory {
    groups: GroupReader,
    users: UserReader,
    publisher: Arc<dyn EventPublisher>,
    time: Arc<dyn TimeSource>,
}

impl GroupDirectory {
    pub fn new(
        groups: GroupReader,
        users: UserReader,
        publisher: Arc<dyn EventPublisher>,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            groups,
            users,
            publisher,
            time,
        }
    }

    async fn publish(&self, event: PlatformEvent) {
        self.publisher
            .publish(EventEnvelope::new(event, self.time.now()))
            .await;
    }

    async fn edit_group<F>(&self, id: &GroupId, mutate: F) -> PlatformResult<Group>
    where
        F: FnMut(&mut Group) -> PlatformResult<Mutation> + Send,
    {
        let store = self.groups.store();
        let result = self
            .groups
            .guard()
            .write(
                AggregateKind::Group.dependency_name(),
                update_with_retry::<Group, _, PlatformError, _>(
                    store.as_ref(),
                    id,
                    DEFAULT_CAS_ATTEMPTS,
                    mutate,
                ),
            )
            .await;
        self.groups.invalidate(id).await;
        result
    }

    async fn edit_user<F>(&self, id: &UserId, mutate: F) -> PlatformResult<User>
    where
        F: FnMut(&mut User) -> PlatformResult<Mutation> + Send,
    {
        let store = self.users.store();
        let result = self
            .users
            .guard()
            .write(
                AggregateKind::User.dependency_name(),
                update_with_retry::<User, _, PlatformError, _>(
                    store.as_ref(),
                    id,
                    DEFAULT_CAS_ATTEMPTS,
                    mutate,
                ),
            )
            .await;
        self.users.invalidate(id).await;
        result
    }

    async fn link(&self, user: &UserId, group: &GroupId) -> PlatformResult<User> {
        self.edit_user(user, |u| {
            if u.is_member_of(group) {
                return Ok(Mutation::Unchanged);
            }
            u.groups.push(group.clone());
            Ok(Mutation::Changed)
        })
        .await
    }

    async fn unlink(&self, user: &UserId, group: &GroupId) -> PlatformResult<User> {
        self.edit_user(user, |u| {
            if !u.is_member_of(group) {
                return Ok(Mutation::Unchanged);
            }
            u.groups.retain(|g| g != group);
            Ok(Mutation::Changed)
        })
        .await
    }

    /// Revert a member push after the user side failed.
    async fn revert_join(&self, group: &GroupId, user: &UserId) {
        let reverted = self
            .edit_group(group, |g| {
                if !g.has_member(user) {
                    return Ok(Mutation::Unchanged);
                }
                g.members.retain(|m| &m.user != user);
                Ok(Mutation::Changed)
            })
            .await;
        if let Err(e) = reverted {
            error!(group_id = %group, user_id = %user, error = %e, "Failed to revert member join");
        }
    }

    /// Put back a member removed by a leave whose user side failed.
    async fn revert_leave(&self, group: &GroupId, member: GroupMember) {
        let user = member.user.clone();
        let reverted = self
            .edit_group(group, |g| {
                if g.has_member(&member.user) {
                    return Ok(Mutation::Unchanged);
                }
                g.members.push(member.clone());
                Ok(Mutation::Changed)
            })
            .await;
        if let Err(e) = reverted {
            error!(group_id = %group, user_id = %user, error = %e, "Failed to revert member leave");
        }
    }

    /// Best-effort removal of a group whose creator could not be linked.
    async fn discard(&self, group: &GroupId) {
        let store = self.groups.store();
        let removed = self
            .groups
            .guard()
            .write(AggregateKind::Group.dependency_name(), store.delete(group))
            .await;
        self.groups.invalidate(group).await;
        if let Err(e) = removed {
            error!(group_id = %group, error = %e, "Failed to discard half-created group");
        }
    }

    fn newest_first(mut groups: Vec<Group>) -> Vec<Group> {
        groups.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        groups
    }
}

#[async_trait]
impl GroupApi for GroupDirectory {
    async fn create_group(&self, request: NewGroup) -> PlatformResult<Group> {
        request.validate()?;
        let creator = self.users.require(&request.creator).await?;
        let now = self.time.now();
        let store = self.groups.store();

        let mut attempt = 0;
        let created = loop {
            attempt += 1;
            let mut group = Group::new(
                GroupId::generate(),
                request.name.trim(),
                creator.id.clone(),
                generate_invite_code(),
                now,
            );
            group.description = request.description.clone();
            group.is_private = request.is_private;
            group.allowed_emails = request
                .allowed_emails
                .iter()
                .map(|e| e.trim().to_lowercase())
                .filter(|e| !e.is_empty())
                .collect();

            match self
                .groups
                .guard()
                .write(AggregateKind::Group.dependency_name(), store.insert(group))
                .await
            {
                Ok(group) => break group,
                Err(PlatformError::BadRequest(reason)) if attempt < INVITE_CODE_ATTEMPTS => {
                    debug!(attempt, %reason, "Invite code collision, regenerating");
                }
                Err(e) => return Err(e),
            }
        };
        self.groups.on_create(&created.id).await;

        if let Err(e) = self.link(&creator.id, &created.id).await {
            warn!(group_id = %created.id, creator = %creator.id, error = %e, "Creator link failed, discarding group");
            self.discard(&created.id).await;
            return Err(e);
        }

        info!(group_id = %created.id, creator = %creator.id, private = created.is_private, "Group created");
        self.publish(PlatformEvent::GroupCreated {
            group_id: created.id.clone(),
            creator: creator.id,
        })
        .await;
        Ok(created)
    }

    async fn join_group(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        invite_code: Option<&str>,
    ) -> PlatformResult<Group> {
        let group = self.groups.require(group_id).await?;
        let user = self.users.require(user_id).await?;
        check_join(&group, &user, invite_code)?;

        let joined_at = self.time.now();
        let updated = self
            .edit_group(group_id, |g| {
                check_join(g, &user, invite_code)?;
                g.members.push(GroupMember {
                    user: user.id.clone(),
                    role: MemberRole::Member,
                    joined_at,
                });
                Ok(Mutation::Changed)
            })
            .await?;

        if let Err(e) = self.link(user_id, group_id).await {
            warn!(group_id = %group_id, user_id = %user_id, error = %e, "User link failed, reverting join");
            self.revert_join(group_id, user_id).await;
            return Err(e);
        }

        info!(group_id = %group_id, user_id = %user_id, "Member joined");
        self.publish(PlatformEvent::MemberJoined {
            group_id: group_id.clone(),
            user_id: user_id.clone(),
        })
        .await;
        Ok(updated)
    }

    async fn leave_group(&self, group_id: &GroupId, user_id: &UserId) -> PlatformResult<()> {
        let group = self.groups.require(group_id).await?;
        check_leave(&group, user_id)?;

        let mut removed: Option<GroupMember> = None;
        self.edit_group(group_id, |g| {
            removed = None;
            check_leave(g, user_id)?;
            if let Some(index) = g.members.iter().position(|m| &m.user == user_id) {
                removed = Some(g.members.remove(index));
            }
            Ok(Mutation::Changed)
        })
        .await?;

        if let Err(e) = self.unlink(user_id, group_id).await {
            warn!(group_id = %group_id, user_id = %user_id, error = %e, "User unlink failed, reverting leave");
            if let Some(member) = removed {
                self.revert_leave(group_id, member).await;
            }
            return Err(e);
        }

        info!(group_id = %group_id, user_id = %user_id, "Member left");
        self.publish(PlatformEvent::MemberLeft {
            group_id: group_id.clone(),
            user_id: user_id.clone(),
        })
        .await;
        Ok(())
    }

    async fn delete_group(&self, group_id: &GroupId, caller: &UserId) -> PlatformResult<()> {
        let group = self.groups.require(group_id).await?;
        if &group.creator != caller {
            return Err(PlatformError::Unauthorized("Not authorized".into()));
        }

        // Unlink members first so a failed delete can simply be retried.
        for member in &group.members {
            match self.unlink(&member.user, group_id).await {
                Ok(_) => {}
                Err(PlatformError::NotFound { .. }) => {
                    debug!(group_id = %group_id, user_id = %member.user, "Member record missing, skipping");
                }
                Err(e) => return Err(e),
            }
        }

        let store = self.groups.store();
        let removed = self
            .groups
            .guard()
            .write(AggregateKind::Group.dependency_name(), store.delete(group_id))
            .await;
        self.groups.invalidate(group_id).await;
        if !removed? {
            return Err(PlatformError::not_found(AggregateKind::Group, group_id));
        }

        info!(group_id = %group_id, members = group.members.len(), "Group deleted");
        self.publish(PlatformEvent::GroupDeleted {
            group_id: group_id.clone(),
        })
        .await;
        Ok(())
    }

    async fn get_group(&self, id: &GroupId) -> Option<Group> {
        self.groups.get_by_id(id).await
    }

    async fn groups_of(&self, user: &UserId) -> Vec<Group> {
        let groups = self.groups.list().await;
        Self::newest_first(groups.into_iter().filter(|g| g.has_member(user)).collect())
    }

    async fn public_groups(&self) -> Vec<Group> {
        let groups = self.groups.list().await;
        Self::newest_first(groups.into_iter().filter(|g| !g.is_private).collect())
    }
}
