//! Contest lifecycle: create, read, list, delete, refresh.
//!
//! Reads always carry the live status derived from the clock; the stored
//! status is only moved forward by `refresh_status`.

use crate::domain::{derive_status, next_persisted, status_of, with_live_status};
use crate::ports::inbound::{ContestApi, NewContest};
use async_trait::async_trait;
use cl_01_store::{update_with_retry, Mutation, DEFAULT_CAS_ATTEMPTS};
use cl_02_resilience::ContestReader;
use shared_bus::{EventEnvelope, EventPublisher, PlatformEvent};
use shared_types::{
    AggregateKind, Contest, ContestId, ContestStatus, ParticipatingGroup, PlatformError,
    PlatformResult, StoreError, TimeSource, UserId,
};
use std::sync::Arc;
use tracing::{debug, info};

pub struct ContestLifecycle {
    contests: ContestReader,
    publisher: Arc<dyn EventPublisher>,
    time: Arc<dyn TimeSource>,
}

impl ContestLifecycle {
    pub fn new(
        contests: ContestReader,
        publisher: Arc<dyn EventPublisher>,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            contests,
            publisher,
            time,
        }
    }

    fn dependency() -> &'static str {
        AggregateKind::Contest.dependency_name()
    }

    async fn publish(&self, event: PlatformEvent) {
        self.publisher
            .publish(EventEnvelope::new(event, self.time.now()))
            .await;
    }

    fn validate(request: &NewContest) -> PlatformResult<()> {
        if request.title.trim().is_empty() {
            return Err(PlatformError::bad_request("contest title is required"));
        }
        if request.duration_minutes == 0 {
            return Err(PlatformError::bad_request("contest duration must be positive"));
        }
        if request.participating_groups.is_empty() {
            return Err(PlatformError::bad_request(
                "a contest needs at least one participating group",
            ));
        }
        if request.problems.is_empty() {
            return Err(PlatformError::bad_request("a contest needs at least one problem"));
        }
        if request.problems.iter().any(|p| p.points.is_some_and(|pts| pts < 0)) {
            return Err(PlatformError::bad_request("problem points cannot be negative"));
        }
        Ok(())
    }
}

#[async_trait]
impl ContestApi for ContestLifecycle {
    async fn create_contest(&self, request: NewContest) -> PlatformResult<Contest> {
        Self::validate(&request)?;

        let now = self.time.now();
        let end_time = Contest::compute_end(request.start_time, request.duration_minutes);

        let mut participating_groups: Vec<ParticipatingGroup> = Vec::new();
        for group in request.participating_groups {
            if !participating_groups.iter().any(|pg| pg.group == group) {
                participating_groups.push(ParticipatingGroup { group, score: 0 });
            }
        }

        let contest = Contest {
            id: ContestId::generate(),
            title: request.title,
            description: request.description,
            creator: request.creator,
            start_time: request.start_time,
            duration_minutes: request.duration_minutes,
            end_time,
            status: derive_status(now, request.start_time, end_time),
            participating_groups,
            problems: request.problems,
            submissions: Vec::new(),
            created_at: now,
            version: 0,
        };

        let store = self.contests.store();
        let created = self
            .contests
            .guard()
            .write(Self::dependency(), store.insert(contest))
            .await?;
        self.contests.on_create(&created.id).await;

        info!(
            contest_id = %created.id,
            creator = %created.creator,
            start_time = created.start_time,
            end_time = created.end_time,
            "Contest created"
        );
        self.publish(PlatformEvent::ContestCreated {
            contest_id: created.id.clone(),
            creator: created.creator.clone(),
            start_time: created.start_time,
            end_time: created.end_time,
        })
        .await;

        Ok(created)
    }

    async fn get_contest(&self, id: &ContestId) -> Option<Contest> {
        let now = self.time.now();
        self.contests
            .get_by_id(id)
            .await
            .map(|c| with_live_status(c, now))
    }

    async fn list_contests(&self) -> Vec<Contest> {
        let now = self.time.now();
        let mut contests: Vec<Contest> = self
            .contests
            .list()
            .await
            .into_iter()
            .map(|c| with_live_status(c, now))
            .collect();
        contests.sort_by(|a, b| b.start_time.cmp(&a.start_time).then_with(|| a.id.cmp(&b.id)));
        contests
    }

    async fn delete_contest(&self, id: &ContestId, caller: &UserId) -> PlatformResult<()> {
        let contest = self.contests.require(id).await?;
        if &contest.creator != caller {
            return Err(PlatformError::Unauthorized(
                "only the contest creator can delete it".into(),
            ));
        }

        let store = self.contests.store();
        let removed = self
            .contests
            .guard()
            .write(Self::dependency(), store.delete(id))
            .await;
        self.contests.invalidate(id).await;
        if !removed? {
            return Err(PlatformError::not_found(AggregateKind::Contest, id));
        }

        info!(contest_id = %id, "Contest deleted");
        self.publish(PlatformEvent::ContestDeleted {
            contest_id: id.clone(),
        })
        .await;
        Ok(())
    }

    async fn refresh_status(&self, id: &ContestId) -> PlatformResult<ContestStatus> {
        let now = self.time.now();
        let mut transition: Option<(ContestStatus, ContestStatus)> = None;

        let store = self.contests.store();
        let updated = self
            .contests
            .guard()
            .write(
                Self::dependency(),
                update_with_retry::<Contest, _, StoreError, _>(
                    store.as_ref(),
                    id,
                    DEFAULT_CAS_ATTEMPTS,
                    |contest| {
                        transition = None;
                        let next = next_persisted(contest.status, status_of(contest, now));
                        if next == contest.status {
                            return Ok(Mutation::Unchanged);
                        }
                        transition = Some((contest.status, next));
                        contest.status = next;
                        Ok(Mutation::Changed)
                    },
                ),
            )
            .await;
        self.contests.invalidate(id).await;
        let updated = updated?;

        match transition {
            Some((from, to)) => {
                info!(contest_id = %id, %from, %to, "Contest status persisted");
                self.publish(PlatformEvent::ContestStatusChanged {
                    contest_id: id.clone(),
                    from,
                    to,
                })
                .await;
            }
            None => debug!(contest_id = %id, status = %updated.status, "Contest status unchanged"),
        }
        Ok(updated.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support::{harness, problem, START};
    use shared_bus::EventFilter;
    use shared_types::{GroupId, MINUTE_MS};

    fn new_contest(start: u64) -> NewContest {
        NewContest {
            title: "monthly".into(),
            description: "long round".into(),
            creator: UserId::new("ada"),
            start_time: start,
            duration_minutes: 90,
            participating_groups: vec![GroupId::new("g1"), GroupId::new("g2"), GroupId::new("g1")],
            problems: vec![problem(Some(50))],
        }
    }

    #[tokio::test]
    async fn test_create_computes_end_and_dedupes_groups() {
        let h = harness().await;
        let mut sub = h.bus.subscribe(EventFilter::routing_keys(["contest.created"]));
        let now = h.clock.now();

        let contest = h.lifecycle.create_contest(new_contest(now + MINUTE_MS)).await.unwrap();
        assert_eq!(contest.end_time, now + MINUTE_MS + 90 * MINUTE_MS);
        assert_eq!(contest.status, ContestStatus::Upcoming);
        assert_eq!(contest.participating_groups.len(), 2);
        assert!(contest.participating_groups.iter().all(|pg| pg.score == 0));
        assert!(sub.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_create_validates_request() {
        let h = harness().await;
        let mut bad = new_contest(0);
        bad.duration_minutes = 0;
        assert!(matches!(
            h.lifecycle.create_contest(bad).await,
            Err(PlatformError::BadRequest(_))
        ));
        let mut bad = new_contest(0);
        bad.title = "  ".into();
        assert!(h.lifecycle.create_contest(bad).await.is_err());
    }

    #[tokio::test]
    async fn test_get_derives_live_status() {
        let h = harness().await;
        let id = ContestId::new("c1");
        // Stored status is Upcoming, but the clock is 30 minutes in.
        assert_eq!(h.lifecycle.get_contest(&id).await.unwrap().status, ContestStatus::Ongoing);
        h.clock.set(START + 61 * MINUTE_MS);
        assert_eq!(
            h.lifecycle.get_contest(&id).await.unwrap().status,
            ContestStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_get_is_absent_when_circuit_open() {
        let h = harness().await;
        h.guard.breakers().force_open("contestService");
        assert!(h.lifecycle.get_contest(&ContestId::new("c1")).await.is_none());
        assert!(h.lifecycle.list_contests().await.is_empty());
    }

    #[tokio::test]
    async fn test_list_newest_start_first() {
        let h = harness().await;
        let later = h.lifecycle.create_contest(new_contest(START + 500 * MINUTE_MS)).await.unwrap();
        let list = h.lifecycle.list_contests().await;
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, later.id);
        assert_eq!(list[1].id, ContestId::new("c1"));
    }

    #[tokio::test]
    async fn test_only_creator_deletes() {
        let h = harness().await;
        let id = ContestId::new("c1");
        let err = h
            .lifecycle
            .delete_contest(&id, &UserId::new("bob"))
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Unauthorized(_)));

        // Warm the cache, then delete; the read after must not see it.
        assert!(h.lifecycle.get_contest(&id).await.is_some());
        h.lifecycle.delete_contest(&id, &UserId::new("ada")).await.unwrap();
        assert!(h.lifecycle.get_contest(&id).await.is_none());
    }

    #[tokio::test]
    async fn test_refresh_persists_forward_only() {
        let h = harness().await;
        let id = ContestId::new("c1");
        let mut sub = h.bus.subscribe(EventFilter::routing_keys(["contest.status_changed"]));

        assert_eq!(h.lifecycle.refresh_status(&id).await.unwrap(), ContestStatus::Ongoing);
        assert_eq!(h.contests.snapshot(&id).unwrap().status, ContestStatus::Ongoing);
        assert!(sub.recv().await.is_some());

        // Unchanged: no event.
        h.lifecycle.refresh_status(&id).await.unwrap();
        assert!(sub.try_recv().unwrap().is_none());

        h.clock.set(START + 61 * MINUTE_MS);
        assert_eq!(h.lifecycle.refresh_status(&id).await.unwrap(), ContestStatus::Completed);

        // Clock skew backwards never regresses the stored status.
        h.clock.set(START - MINUTE_MS);
        assert_eq!(h.lifecycle.refresh_status(&id).await.unwrap(), ContestStatus::Completed);
    }
}
