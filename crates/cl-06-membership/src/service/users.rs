//! User registration and profiles.

use crate::domain::{ProfileUpdate, Registration};
use crate::ports::inbound::UserApi;
use async_trait::async_trait;
use cl_01_store::{update_with_retry, DocumentStore, Mutation, UserStore, DEFAULT_CAS_ATTEMPTS};
use cl_02_resilience::UserReader;
use shared_bus::{EventEnvelope, EventPublisher, PlatformEvent};
use shared_types::{AggregateKind, PlatformError, PlatformResult, TimeSource, User, UserId};
use std::sync::Arc;
use tracing::info;

pub struct UserDirectory {
    users: UserReader,
    publisher: Arc<dyn EventPublisher>,
    time: Arc<dyn TimeSource>,
}

impl UserDirectory {
    pub fn new(
        users: UserReader,
        publisher: Arc<dyn EventPublisher>,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            users,
            publisher,
            time,
        }
    }

    fn dependency() -> &'static str {
        AggregateKind::User.dependency_name()
    }

    async fn publish(&self, event: PlatformEvent) {
        self.publisher
            .publish(EventEnvelope::new(event, self.time.now()))
            .await;
    }
}

#[async_trait]
impl UserApi for UserDirectory {
    async fn register(&self, registration: Registration) -> PlatformResult<User> {
        let registration = registration.normalized()?;
        let store = self.users.store();
        let guard = self.users.guard();

        let existing = guard
            .write(Self::dependency(), store.find_by_email(&registration.email))
            .await?;
        if existing.is_some() {
            return Err(PlatformError::bad_request("User already exists"));
        }

        let mut user = User::new(
            UserId::generate(),
            registration.name,
            registration.email,
            registration.college,
            registration.department,
            self.time.now(),
        );
        user.year = registration.year;

        // A concurrent registration can still win the unique index.
        let created = guard
            .write(Self::dependency(), store.insert(user))
            .await
            .map_err(|e| match e {
                PlatformError::BadRequest(_) => PlatformError::bad_request("User already exists"),
                other => other,
            })?;
        self.users.on_create(&created.id).await;

        info!(user_id = %created.id, email = %created.email, "User registered");
        self.publish(PlatformEvent::UserCreated {
            user_id: created.id.clone(),
            email: created.email.clone(),
        })
        .await;
        Ok(created)
    }

    async fn update_profile(&self, id: &UserId, update: ProfileUpdate) -> PlatformResult<User> {
        let mut changed = false;
        let store = self.users.store();
        let updated = self
            .users
            .guard()
            .write(
                Self::dependency(),
                update_with_retry::<User, _, PlatformError, _>(
                    store.as_ref(),
                    id,
                    DEFAULT_CAS_ATTEMPTS,
                    |user| {
                        let mutation = update.apply(user);
                        changed = mutation == Mutation::Changed;
                        Ok(mutation)
                    },
                ),
            )
            .await;
        self.users.invalidate(id).await;
        let updated = updated?;

        if changed {
            info!(user_id = %id, "Profile updated");
            self.publish(PlatformEvent::UserUpdated {
                user_id: id.clone(),
            })
            .await;
        }
        Ok(updated)
    }

    async fn get_user(&self, id: &UserId) -> Option<User> {
        self.users.get_by_id(id).await
    }
}
