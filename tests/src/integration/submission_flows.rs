//! Submission saga across contest, user and group documents.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{submission, world, GRACE};
    use cl_01_store::{FaultMode, FaultScope};
    use cl_03_contest::{ContestApi, IntentState, IntentStore, SubmissionApi};
    use platform_runtime::RecoverySweeper;
    use shared_bus::{EventFilter, EventTopic, PlatformEvent};
    use shared_types::PlatformError;
    use std::time::Duration;

    // =========================================================================
    // EXACTLY-ONCE
    // =========================================================================

    #[tokio::test]
    async fn test_retried_request_is_replayed_not_reapplied() {
        let w = world();
        let (contest, group, members) = w.running_contest(1).await;
        let ada = &members[0];
        let req = submission(&contest.id, &ada.id, 0, "fn main() {}");

        let first = w.platform.submissions.submit(req.clone()).await.unwrap();
        let second = w.platform.submissions.submit(req).await.unwrap();

        assert!(!first.replayed);
        assert!(second.replayed);
        assert_eq!(first.intent_id, second.intent_id);
        assert_eq!(w.totals(&contest.id, &group.id, &ada.id), (100, 100, 100, 1));
    }

    #[tokio::test]
    async fn test_partial_failure_then_retry_completes_once() {
        let w = world();
        let (contest, group, members) = w.running_contest(1).await;
        let ada = &members[0];
        let req = submission(&contest.id, &ada.id, 1, "attempt");

        w.platform
            .group_store
            .faults()
            .set(FaultMode::Failing, FaultScope::Writes);
        let err = w.platform.submissions.submit(req.clone()).await.unwrap_err();
        assert!(matches!(err, PlatformError::ServiceUnavailable { .. }));
        assert_eq!(w.totals(&contest.id, &group.id, &ada.id), (30, 0, 30, 1));

        w.platform.group_store.faults().heal();
        let receipt = w.platform.submissions.submit(req).await.unwrap();
        assert!(receipt.replayed);
        assert_eq!(receipt.state, IntentState::Completed);
        assert_eq!(w.totals(&contest.id, &group.id, &ada.id), (30, 30, 30, 1));
    }

    // =========================================================================
    // RECOVERY
    // =========================================================================

    #[tokio::test]
    async fn test_sweeper_finishes_stalled_submission() {
        let w = world();
        let (contest, group, members) = w.running_contest(1).await;
        let ada = &members[0];
        let mut accepted = w
            .platform
            .bus
            .subscribe(EventFilter::routing_keys(["submission.accepted"]));

        w.platform
            .user_store
            .faults()
            .set(FaultMode::Failing, FaultScope::Writes);
        assert!(w
            .platform
            .submissions
            .submit(submission(&contest.id, &ada.id, 0, "x"))
            .await
            .is_err());
        w.platform.user_store.faults().heal();

        let sweeper = RecoverySweeper::new(w.platform.submissions.clone(), Duration::from_secs(1));
        let report = sweeper.sweep_once().await.unwrap();
        assert_eq!(report.scanned, 0);

        w.clock.advance(GRACE.as_millis() as u64 + 1_000);
        let report = sweeper.sweep_once().await.unwrap();
        assert_eq!(report.recovered, 1);
        assert_eq!(w.totals(&contest.id, &group.id, &ada.id), (100, 100, 100, 1));
        assert_eq!(w.platform.intent_store.pending_count().await.unwrap(), 0);

        let event = accepted.recv().await.unwrap();
        assert!(matches!(event.payload, PlatformEvent::SubmissionAccepted { .. }));
    }

    #[tokio::test]
    async fn test_persistent_failure_ends_in_dead_letter_queue() {
        let w = world();
        let (contest, group, members) = w.running_contest(1).await;
        let ada = &members[0];
        let mut dlq = w
            .platform
            .bus
            .subscribe(EventFilter::topics(vec![EventTopic::DeadLetterQueue]));

        w.platform
            .user_store
            .faults()
            .set(FaultMode::Failing, FaultScope::Writes);
        assert!(w
            .platform
            .submissions
            .submit(submission(&contest.id, &ada.id, 0, "x"))
            .await
            .is_err());

        let mut dead = 0;
        for _ in 0..3 {
            w.clock.advance(GRACE.as_millis() as u64 + 1_000);
            dead += w.platform.submissions.recover_incomplete().await.unwrap().dead_lettered;
        }
        assert_eq!(dead, 1);
        assert!(dlq.recv().await.is_some());
        // The contest step landed before the user store went down; nothing else did.
        assert_eq!(w.totals(&contest.id, &group.id, &ada.id), (0, 0, 100, 1));
    }

    // =========================================================================
    // CONCURRENCY
    // =========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_submissions_keep_group_total_consistent() {
        let w = world();
        let (contest, group, members) = w.running_contest(12).await;

        let handles: Vec<_> = members
            .iter()
            .enumerate()
            .map(|(i, user)| {
                let submissions = w.platform.submissions.clone();
                let req = submission(&contest.id, &user.id, i % 2, &format!("solution {i}"));
                tokio::spawn(async move { submissions.submit(req).await })
            })
            .collect();
        for result in futures::future::join_all(handles).await {
            result.unwrap().unwrap();
        }

        let stored = w.platform.contest_store.snapshot(&contest.id).unwrap();
        let expected: i64 = (0..12).map(|i| if i % 2 == 0 { 100 } else { 30 }).sum();
        assert_eq!(stored.submissions.len(), 12);
        assert_eq!(stored.submission_total(&group.id), expected);
        assert_eq!(stored.participating_group(&group.id).unwrap().score, expected);
        assert_eq!(
            w.platform.group_store.snapshot(&group.id).unwrap().group_score,
            expected
        );
    }

    // =========================================================================
    // DEGRADATION
    // =========================================================================

    #[tokio::test]
    async fn test_open_circuit_rejects_writes_and_reads_fall_back() {
        let w = world();
        let (contest, _, members) = w.running_contest(1).await;

        w.platform.guard.breakers().force_open("contestService");

        let err = w
            .platform
            .submissions
            .submit(submission(&contest.id, &members[0].id, 0, "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::ServiceUnavailable { .. }));
        assert!(w.platform.intent_store.is_empty());

        assert!(w.platform.contest_lifecycle.get_contest(&contest.id).await.is_none());
        assert!(w.platform.contest_lifecycle.list_contests().await.is_empty());
    }
}
