//! Submission preconditions.
//!
//! Checked in order, each with its own error:
//!
//! 1. contest is ongoing            -> `ContestNotActive`
//! 2. user is in a participating group -> `BadRequest`
//! 3. problem index exists          -> `BadRequest`
//!
//! A user in several participating groups is credited to the first one in
//! the contest's participating-group order.

use super::status::status_of;
use shared_types::{Contest, ContestStatus, GroupId, PlatformError, PlatformResult, Timestamp, User};

/// What an eligible submission is worth and to whom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eligibility {
    pub group: GroupId,
    pub score: i64,
}

/// First precondition on its own; needs no user.
pub fn ensure_active(contest: &Contest, now: Timestamp) -> PlatformResult<()> {
    let status = status_of(contest, now);
    if status != ContestStatus::Ongoing {
        return Err(PlatformError::ContestNotActive {
            contest_id: contest.id.clone(),
            status,
        });
    }
    Ok(())
}

pub fn check_eligibility(
    contest: &Contest,
    user: &User,
    problem_index: usize,
    now: Timestamp,
) -> PlatformResult<Eligibility> {
    ensure_active(contest, now)?;

    let group = contest
        .participating_groups
        .iter()
        .find(|pg| user.is_member_of(&pg.group))
        .map(|pg| pg.group.clone())
        .ok_or_else(|| {
            PlatformError::bad_request("You are not part of any participating group")
        })?;

    let problem = contest.problems.get(problem_index).ok_or_else(|| {
        PlatformError::bad_request(format!(
            "problem index {problem_index} out of range ({} problems)",
            contest.problems.len()
        ))
    })?;

    Ok(Eligibility {
        group,
        score: problem.award(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{
        ContestId, Difficulty, ParticipatingGroup, Problem, UserId, MINUTE_MS,
    };

    fn contest(groups: &[&str]) -> Contest {
        Contest {
            id: ContestId::new("c1"),
            title: "weekly".into(),
            description: String::new(),
            creator: UserId::new("owner"),
            start_time: 0,
            duration_minutes: 60,
            end_time: 60 * MINUTE_MS,
            status: ContestStatus::Upcoming,
            participating_groups: groups
                .iter()
                .map(|g| ParticipatingGroup {
                    group: GroupId::new(*g),
                    score: 0,
                })
                .collect(),
            problems: vec![
                Problem {
                    title: "a".into(),
                    description: String::new(),
                    difficulty: Difficulty::Easy,
                    points: Some(100),
                    test_cases: vec![],
                },
                Problem {
                    title: "b".into(),
                    description: String::new(),
                    difficulty: Difficulty::Hard,
                    points: None,
                    test_cases: vec![],
                },
            ],
            submissions: vec![],
            created_at: 0,
            version: 1,
        }
    }

    fn user_in(groups: &[&str]) -> User {
        let mut u = User::new(UserId::new("u1"), "Ada", "ada@x.org", "MIT", "CS", 0);
        u.groups = groups.iter().map(|g| GroupId::new(*g)).collect();
        u
    }

    #[test]
    fn test_eligible_submission() {
        let e = check_eligibility(&contest(&["g1"]), &user_in(&["g1"]), 0, MINUTE_MS).unwrap();
        assert_eq!(e.group, GroupId::new("g1"));
        assert_eq!(e.score, 100);
    }

    #[test]
    fn test_default_points() {
        let e = check_eligibility(&contest(&["g1"]), &user_in(&["g1"]), 1, MINUTE_MS).unwrap();
        assert_eq!(e.score, 100);
    }

    #[test]
    fn test_not_active() {
        let err = check_eligibility(&contest(&["g1"]), &user_in(&["g1"]), 0, 61 * MINUTE_MS)
            .unwrap_err();
        assert!(matches!(
            err,
            PlatformError::ContestNotActive {
                status: ContestStatus::Completed,
                ..
            }
        ));
    }

    #[test]
    fn test_not_in_any_group() {
        let err = check_eligibility(&contest(&["g1"]), &user_in(&["g9"]), 0, MINUTE_MS)
            .unwrap_err();
        assert!(matches!(err, PlatformError::BadRequest(_)));
    }

    #[test]
    fn test_first_participating_group_wins() {
        // User joined g2 first, but the contest lists g1 first.
        let e = check_eligibility(&contest(&["g1", "g2"]), &user_in(&["g2", "g1"]), 0, MINUTE_MS)
            .unwrap();
        assert_eq!(e.group, GroupId::new("g1"));
    }

    #[test]
    fn test_bad_problem_index() {
        let err = check_eligibility(&contest(&["g1"]), &user_in(&["g1"]), 7, MINUTE_MS)
            .unwrap_err();
        assert!(matches!(err, PlatformError::BadRequest(_)));
    }
}
