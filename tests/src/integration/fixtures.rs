//! A fully wired platform on a manual clock.

use std::sync::Arc;
use std::time::Duration;

use cl_03_contest::{ContestApi, NewContest, SubmitRequest};
use cl_06_membership::{GroupApi, NewGroup, Registration, UserApi};
use platform_runtime::{PlatformConfig, ServiceContainer};
use shared_types::{
    Contest, ContestId, Difficulty, Group, GroupId, ManualTimeSource, Problem, User, UserId,
    MINUTE_MS,
};

/// Contests created by [`World::contest`] start here.
pub const START: u64 = 10_000 * MINUTE_MS;

/// Recovery grace used by every world.
pub const GRACE: Duration = Duration::from_secs(5);

pub struct World {
    pub platform: Arc<ServiceContainer>,
    pub clock: Arc<ManualTimeSource>,
}

/// Defaults, with a breaker that only opens when forced and a short saga grace.
pub fn config() -> PlatformConfig {
    let mut config = PlatformConfig::default();
    config.resilience.call_timeout = Duration::from_millis(500);
    config.resilience.breaker.failure_threshold = 1_000;
    config.saga.recovery_grace = GRACE;
    config.saga.max_attempts = 3;
    config
}

pub fn world() -> World {
    world_with(config())
}

pub fn world_with(config: PlatformConfig) -> World {
    let clock = Arc::new(ManualTimeSource::new(START - 60 * MINUTE_MS));
    let platform = Arc::new(ServiceContainer::with_time(config, clock.clone()));
    World { platform, clock }
}

pub fn problem(points: i64) -> Problem {
    Problem {
        title: format!("problem worth {points}"),
        description: String::new(),
        difficulty: Difficulty::Medium,
        points: Some(points),
        test_cases: vec![],
    }
}

impl World {
    /// Register `handle` at MIT/CS with email `handle@x.org`.
    pub async fn user(&self, handle: &str) -> User {
        self.platform
            .user_directory
            .register(Registration {
                name: handle.to_string(),
                email: format!("{handle}@x.org"),
                college: "MIT".into(),
                department: "CS".into(),
                year: Some(2),
            })
            .await
            .unwrap()
    }

    /// Public group created by `creator`, joined by every user in `members`.
    pub async fn group(&self, name: &str, creator: &UserId, members: &[&User]) -> Group {
        let groups = &self.platform.group_directory;
        let group = groups
            .create_group(NewGroup {
                name: name.to_string(),
                description: String::new(),
                creator: creator.clone(),
                allowed_emails: vec![],
                is_private: false,
            })
            .await
            .unwrap();
        for member in members {
            groups.join_group(&group.id, &member.id, None).await.unwrap();
        }
        groups.get_group(&group.id).await.unwrap()
    }

    /// One-hour contest at [`START`] with a 100- and a 30-point problem.
    pub async fn contest(&self, creator: &UserId, groups: &[GroupId]) -> Contest {
        self.platform
            .contest_lifecycle
            .create_contest(NewContest {
                title: "weekly".into(),
                description: String::new(),
                creator: creator.clone(),
                start_time: START,
                duration_minutes: 60,
                participating_groups: groups.to_vec(),
                problems: vec![problem(100), problem(30)],
            })
            .await
            .unwrap()
    }

    /// Move the clock to `minutes` past [`START`].
    pub fn at_minute(&self, minutes: i64) {
        let offset = minutes * MINUTE_MS as i64;
        self.clock.set((START as i64 + offset) as u64);
    }

    /// A creator, a group with `n` extra members, and a contest 10 minutes in.
    pub async fn running_contest(&self, n: usize) -> (Contest, Group, Vec<User>) {
        let creator = self.user("host").await;
        let mut members = Vec::with_capacity(n);
        for i in 0..n {
            members.push(self.user(&format!("member{i}")).await);
        }
        let refs: Vec<&User> = members.iter().collect();
        let group = self.group("algo", &creator.id, &refs).await;
        let contest = self.contest(&creator.id, &[group.id.clone()]).await;
        self.at_minute(10);
        (contest, group, members)
    }

    /// Stored `(user score, group score, participating-group score, submissions)`.
    pub fn totals(
        &self,
        contest: &ContestId,
        group: &GroupId,
        user: &UserId,
    ) -> (i64, i64, i64, usize) {
        let p = &self.platform;
        let user = p.user_store.snapshot(user).unwrap();
        let group_doc = p.group_store.snapshot(group).unwrap();
        let contest = p.contest_store.snapshot(contest).unwrap();
        let pg = contest.participating_group(group).unwrap().score;
        (user.coding_score, group_doc.group_score, pg, contest.submissions.len())
    }
}

pub fn submission(
    contest: &ContestId,
    user: &UserId,
    problem_index: usize,
    code: &str,
) -> SubmitRequest {
    SubmitRequest {
        contest_id: contest.clone(),
        user_id: user.clone(),
        problem_index,
        code: code.to_string(),
        language: "rust".into(),
        idempotency_key: None,
    }
}
