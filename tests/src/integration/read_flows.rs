//! Read paths: cache freshness, leaderboards, derived status, notifications.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{submission, world};
    use async_trait::async_trait;
    use cl_01_store::{DocumentStore, UserScope};
    use cl_03_contest::{ContestApi, SubmissionApi};
    use cl_05_leaderboard::{BoardScope, LeaderboardApi, Rank};
    use cl_06_membership::UserApi;
    use parking_lot::Mutex;
    use platform_runtime::{NotificationSink, PlatformRuntime};
    use shared_bus::{EventEnvelope, EventPublisher};
    use shared_types::{ContestStatus, PlatformError, User, UserId};
    use std::sync::Arc;
    use std::time::Duration;

    // =========================================================================
    // FRESHNESS
    // =========================================================================

    #[tokio::test]
    async fn test_read_after_score_write_sees_new_score() {
        let w = world();
        let (contest, _, members) = w.running_contest(1).await;
        let ada = &members[0];

        // Warm every cache the read paths use.
        assert_eq!(w.platform.users.get_by_id(&ada.id).await.unwrap().coding_score, 0);
        assert!(w.platform.contest_lifecycle.get_contest(&contest.id).await.is_some());

        w.platform
            .submissions
            .submit(submission(&contest.id, &ada.id, 0, "x"))
            .await
            .unwrap();

        let user = w.platform.user_directory.get_user(&ada.id).await.unwrap();
        assert_eq!(user.coding_score, 100);
        let fresh = w.platform.contest_lifecycle.get_contest(&contest.id).await.unwrap();
        assert_eq!(fresh.submissions.len(), 1);
        let top = w.platform.leaderboards.top_users(&UserScope::Global, 1).await;
        assert_eq!(top[0].id, ada.id);
    }

    // =========================================================================
    // LEADERBOARD
    // =========================================================================

    #[tokio::test]
    async fn test_caller_outside_window_is_not_ranked() {
        let w = world();
        for i in 0..150 {
            let mut user = User::new(
                UserId::new(format!("u{i:03}")),
                format!("User {i}"),
                format!("u{i}@x.org"),
                "MIT",
                "CS",
                0,
            );
            user.coding_score = 10_000 - i as i64;
            w.platform.user_store.insert(user).await.unwrap();
        }

        let last = UserId::new("u149");
        let board = w
            .platform
            .leaderboards
            .user_board(&last, BoardScope::Global)
            .await
            .unwrap();
        assert_eq!(board.entries.len(), 100);
        assert!(!board.degraded);
        let caller = board.caller.unwrap();
        assert_eq!(caller.rank, Rank::NotRanked);
        assert_eq!(caller.rank.to_string(), "Not Ranked");

        let hundredth = UserId::new("u099");
        assert_eq!(
            w.platform.leaderboards.rank_of(&hundredth, &UserScope::Global).await,
            Rank::Position(100)
        );
    }

    // =========================================================================
    // CONTEST STATUS
    // =========================================================================

    #[tokio::test]
    async fn test_status_follows_the_clock() {
        let w = world();
        let (contest, _, members) = w.running_contest(1).await;
        let lifecycle = &w.platform.contest_lifecycle;

        w.at_minute(-1);
        assert_eq!(
            lifecycle.get_contest(&contest.id).await.unwrap().status,
            ContestStatus::Upcoming
        );
        w.at_minute(30);
        assert_eq!(
            lifecycle.get_contest(&contest.id).await.unwrap().status,
            ContestStatus::Ongoing
        );
        w.at_minute(61);
        assert_eq!(
            lifecycle.get_contest(&contest.id).await.unwrap().status,
            ContestStatus::Completed
        );

        let err = w
            .platform
            .submissions
            .submit(submission(&contest.id, &members[0].id, 0, "late"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PlatformError::ContestNotActive { status: ContestStatus::Completed, .. }
        ));
    }

    // =========================================================================
    // NOTIFICATIONS
    // =========================================================================

    #[derive(Default)]
    struct AcceptedSink {
        accepted: Mutex<Vec<EventEnvelope>>,
    }

    #[async_trait]
    impl NotificationSink for AcceptedSink {
        async fn deliver(&self, envelope: &EventEnvelope) {
            if envelope.routing_key == "submission.accepted" {
                self.accepted.lock().push(envelope.clone());
            }
        }
    }

    async fn settle(sink: &AcceptedSink, expected: usize) {
        for _ in 0..100 {
            if sink.accepted.lock().len() >= expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_republished_acceptance_is_delivered_once() {
        let w = world();
        let (contest, _, members) = w.running_contest(1).await;
        let sink = Arc::new(AcceptedSink::default());
        let runtime = PlatformRuntime::with_container(w.platform.clone()).with_sink(sink.clone());
        runtime.start();

        let receipt = w
            .platform
            .submissions
            .submit(submission(&contest.id, &members[0].id, 0, "x"))
            .await
            .unwrap();
        settle(&sink, 1).await;
        let delivered = sink.accepted.lock()[0].clone();
        assert_eq!(delivered.event_id, receipt.intent_id.as_uuid());

        w.platform.bus.publish(delivered).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        runtime.shutdown().await;

        assert_eq!(sink.accepted.lock().len(), 1);
    }
}
