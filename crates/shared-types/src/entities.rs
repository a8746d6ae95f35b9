//! # Core Domain Entities
//!
//! The three independently stored aggregates (User, Group, Contest) and the
//! records embedded in them.
//!
//! ## Invariants
//!
//! - `Contest::end_time == start_time + duration_minutes * 60_000`.
//! - The sum of `Submission::score` for a (contest, group) pair equals the
//!   matching `ParticipatingGroup::score`.
//! - A `Submission` is immutable once appended and is identified by the
//!   intent that produced it.

use crate::aggregate::{Aggregate, AggregateKind, Scored};
use crate::ids::{ContestId, GroupId, IntentId, UserId};
use crate::time::{Timestamp, MINUTE_MS};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Points awarded for a problem without an explicit `points` value.
pub const DEFAULT_PROBLEM_POINTS: i64 = 100;

// =============================================================================
// USER
// =============================================================================

/// A registered platform user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    /// Stored lowercased.
    pub email: String,
    pub college: String,
    pub department: String,
    pub year: Option<u8>,
    pub bio: String,
    pub skills: Vec<String>,
    /// Accumulated score from contests and community activity.
    pub coding_score: i64,
    /// Groups this user belongs to, in join order.
    pub groups: Vec<GroupId>,
    pub created_at: Timestamp,
    pub version: u64,
}

impl User {
    /// Create a fresh user with a zero score.
    pub fn new(
        id: UserId,
        name: impl Into<String>,
        email: impl Into<String>,
        college: impl Into<String>,
        department: impl Into<String>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into().to_lowercase(),
            college: college.into(),
            department: department.into(),
            year: None,
            bio: String::new(),
            skills: Vec::new(),
            coding_score: 0,
            groups: Vec::new(),
            created_at,
            version: 0,
        }
    }

    #[must_use]
    pub fn is_member_of(&self, group: &GroupId) -> bool {
        self.groups.contains(group)
    }
}

impl Aggregate for User {
    type Id = UserId;
    const KIND: AggregateKind = AggregateKind::User;

    fn id(&self) -> &UserId {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl Scored for User {
    fn score(&self) -> i64 {
        self.coding_score
    }

    fn set_score(&mut self, score: i64) {
        self.coding_score = score;
    }
}

// =============================================================================
// GROUP
// =============================================================================

/// Role of a member inside a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Admin,
    Member,
}

/// One entry of a group's member list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    pub user: UserId,
    pub role: MemberRole,
    pub joined_at: Timestamp,
}

/// A study group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub description: String,
    pub creator: UserId,
    pub members: Vec<GroupMember>,
    /// Unique across all groups.
    pub invite_code: String,
    /// Lowercased emails; empty means anyone may join.
    pub allowed_emails: Vec<String>,
    pub is_private: bool,
    /// Standalone score, incremented by contest scoring.
    pub group_score: i64,
    pub created_at: Timestamp,
    pub version: u64,
}

impl Group {
    /// Create a public group whose creator is its only (admin) member.
    pub fn new(
        id: GroupId,
        name: impl Into<String>,
        creator: UserId,
        invite_code: impl Into<String>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
            members: vec![GroupMember {
                user: creator.clone(),
                role: MemberRole::Admin,
                joined_at: created_at,
            }],
            creator,
            invite_code: invite_code.into(),
            allowed_emails: Vec::new(),
            is_private: false,
            group_score: 0,
            created_at,
            version: 0,
        }
    }

    #[must_use]
    pub fn has_member(&self, user: &UserId) -> bool {
        self.members.iter().any(|m| &m.user == user)
    }

    /// Whether `email` passes the allowlist. An empty allowlist admits everyone.
    #[must_use]
    pub fn admits_email(&self, email: &str) -> bool {
        if self.allowed_emails.is_empty() {
            return true;
        }
        let email = email.to_lowercase();
        self.allowed_emails.iter().any(|allowed| allowed == &email)
    }
}

impl Aggregate for Group {
    type Id = GroupId;
    const KIND: AggregateKind = AggregateKind::Group;

    fn id(&self) -> &GroupId {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl Scored for Group {
    fn score(&self) -> i64 {
        self.group_score
    }

    fn set_score(&mut self, score: i64) {
        self.group_score = score;
    }
}

// =============================================================================
// CONTEST
// =============================================================================

/// Lifecycle status of a contest.
///
/// Ordered `Upcoming < Ongoing < Completed`; the derived status never
/// decreases as time advances.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum ContestStatus {
    #[default]
    Upcoming,
    Ongoing,
    Completed,
}

impl fmt::Display for ContestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Upcoming => "upcoming",
            Self::Ongoing => "ongoing",
            Self::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// Problem difficulty label. Opaque to scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub output: String,
}

/// A contest problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    /// Points for an accepted submission; `None` means the default.
    pub points: Option<i64>,
    pub test_cases: Vec<TestCase>,
}

impl Problem {
    /// Points awarded for a submission to this problem.
    #[must_use]
    pub fn award(&self) -> i64 {
        self.points.unwrap_or(DEFAULT_PROBLEM_POINTS)
    }
}

/// A group enrolled in a contest with its contest-scoped running score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipatingGroup {
    pub group: GroupId,
    pub score: i64,
}

/// One accepted submission, embedded in its contest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    /// Intent that produced this record; unique within a contest.
    pub intent_id: IntentId,
    pub user: UserId,
    pub group: GroupId,
    pub problem_index: usize,
    pub code: String,
    pub language: String,
    pub score: i64,
    pub submitted_at: Timestamp,
}

/// A timed contest between groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contest {
    pub id: ContestId,
    pub title: String,
    pub description: String,
    pub creator: UserId,
    pub start_time: Timestamp,
    pub duration_minutes: u32,
    pub end_time: Timestamp,
    /// Last persisted status. Informative only; readers derive the live
    /// status from the time bounds.
    pub status: ContestStatus,
    pub participating_groups: Vec<ParticipatingGroup>,
    pub problems: Vec<Problem>,
    pub submissions: Vec<Submission>,
    pub created_at: Timestamp,
    pub version: u64,
}

impl Contest {
    /// End of a contest starting at `start` and lasting `duration_minutes`.
    #[must_use]
    pub fn compute_end(start: Timestamp, duration_minutes: u32) -> Timestamp {
        start.saturating_add(u64::from(duration_minutes) * MINUTE_MS)
    }

    /// The participating-group entry for `group`, if enrolled.
    #[must_use]
    pub fn participating_group(&self, group: &GroupId) -> Option<&ParticipatingGroup> {
        self.participating_groups.iter().find(|pg| &pg.group == group)
    }

    /// Whether the submission for `intent` has already been appended.
    #[must_use]
    pub fn has_submission(&self, intent: &IntentId) -> bool {
        self.submissions.iter().any(|s| &s.intent_id == intent)
    }

    /// Sum of submission scores credited to `group`.
    #[must_use]
    pub fn submission_total(&self, group: &GroupId) -> i64 {
        self.submissions
            .iter()
            .filter(|s| &s.group == group)
            .map(|s| s.score)
            .sum()
    }
}

impl Aggregate for Contest {
    type Id = ContestId;
    const KIND: AggregateKind = AggregateKind::Contest;

    fn id(&self) -> &ContestId {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group_with_allowlist(emails: &[&str]) -> Group {
        Group {
            id: GroupId::new("g1"),
            name: "algo".into(),
            description: String::new(),
            creator: UserId::new("u1"),
            members: vec![GroupMember {
                user: UserId::new("u1"),
                role: MemberRole::Admin,
                joined_at: 0,
            }],
            invite_code: "abcdefabcdef".into(),
            allowed_emails: emails.iter().map(|e| e.to_string()).collect(),
            is_private: false,
            group_score: 0,
            created_at: 0,
            version: 0,
        }
    }

    #[test]
    fn test_user_email_is_lowercased() {
        let user = User::new(UserId::new("u1"), "Ada", "Ada@Example.COM", "MIT", "CS", 0);
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.coding_score, 0);
    }

    #[test]
    fn test_empty_allowlist_admits_everyone() {
        let group = group_with_allowlist(&[]);
        assert!(group.admits_email("anyone@x.org"));
    }

    #[test]
    fn test_allowlist_is_case_insensitive() {
        let group = group_with_allowlist(&["ada@example.com"]);
        assert!(group.admits_email("ADA@example.com"));
        assert!(!group.admits_email("bob@example.com"));
        assert!(group.has_member(&UserId::new("u1")));
    }

    #[test]
    fn test_problem_award_defaults_to_100() {
        let problem = Problem {
            title: "two sum".into(),
            description: String::new(),
            difficulty: Difficulty::Easy,
            points: None,
            test_cases: vec![],
        };
        assert_eq!(problem.award(), DEFAULT_PROBLEM_POINTS);
        let problem = Problem {
            points: Some(40),
            ..problem
        };
        assert_eq!(problem.award(), 40);
    }

    #[test]
    fn test_compute_end_adds_minutes() {
        assert_eq!(Contest::compute_end(1_000, 60), 1_000 + 60 * MINUTE_MS);
    }

    #[test]
    fn test_status_order() {
        assert!(ContestStatus::Upcoming < ContestStatus::Ongoing);
        assert!(ContestStatus::Ongoing < ContestStatus::Completed);
        assert_eq!(ContestStatus::Ongoing.to_string(), "ongoing");
    }
}
