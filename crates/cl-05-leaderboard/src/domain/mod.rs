//! Leaderboard domain: bounded ranks and board payloads.
//!
//! A rank only exists relative to the window that was fetched. A caller
//! outside the top-N window is `NotRanked` even though a global position
//! exists; callers must treat it as "below the window", not "unrankable".

use serde::Serialize;
use shared_types::{Aggregate, Group, GroupId, MemberRole, User, UserId};
use std::fmt;

/// Position inside a fetched window (1-based) or outside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Rank {
    Position(usize),
    #[serde(rename = "Not Ranked")]
    NotRanked,
}

impl Rank {
    #[must_use]
    pub fn position(self) -> Option<usize> {
        match self {
            Self::Position(p) => Some(p),
            Self::NotRanked => None,
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Position(p) => write!(f, "#{p}"),
            Self::NotRanked => f.write_str("Not Ranked"),
        }
    }
}

/// Rank of `id` inside an already ordered `window`.
pub fn rank_within<A: Aggregate>(window: &[A], id: &A::Id) -> Rank {
    window
        .iter()
        .position(|doc| doc.id() == id)
        .map_or(Rank::NotRanked, |index| Rank::Position(index + 1))
}

/// Which users a board covers, relative to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardScope {
    Global,
    /// The caller's college.
    College,
    /// The caller's college, restricted to one department.
    Department(String),
}

impl BoardScope {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::College => "college",
            Self::Department(_) => "department",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserEntry {
    pub rank: usize,
    pub id: UserId,
    pub name: String,
    pub college: String,
    pub department: String,
    pub coding_score: i64,
}

impl UserEntry {
    fn from_user(rank: usize, user: &User) -> Self {
        Self {
            rank,
            id: user.id.clone(),
            name: user.name.clone(),
            college: user.college.clone(),
            department: user.department.clone(),
            coding_score: user.coding_score,
        }
    }
}

/// The caller's own line, shown even when they are outside the window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallerSummary {
    pub id: UserId,
    pub name: String,
    pub college: String,
    pub department: String,
    pub coding_score: i64,
    pub rank: Rank,
}

impl CallerSummary {
    #[must_use]
    pub fn new(user: &User, rank: Rank) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            college: user.college.clone(),
            department: user.department.clone(),
            coding_score: user.coding_score,
            rank,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserBoard {
    pub window: usize,
    pub entries: Vec<UserEntry>,
    pub caller: Option<CallerSummary>,
    /// True when the user store was degraded and the entries are a fallback.
    pub degraded: bool,
}

impl UserBoard {
    #[must_use]
    pub fn new(window: usize, top: &[User], caller: Option<&User>, degraded: bool) -> Self {
        let entries = top
            .iter()
            .enumerate()
            .map(|(i, u)| UserEntry::from_user(i + 1, u))
            .collect();
        let caller = caller.map(|u| CallerSummary::new(u, rank_within(top, &u.id)));
        Self {
            window,
            entries,
            caller,
            degraded,
        }
    }
}

/// A group member as shown on the group board. Name and score are missing
/// when the member's record could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberSummary {
    pub user: UserId,
    pub role: MemberRole,
    pub name: Option<String>,
    pub coding_score: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupEntry {
    pub rank: usize,
    pub id: GroupId,
    pub name: String,
    pub group_score: i64,
    pub members: Vec<MemberSummary>,
}

impl GroupEntry {
    #[must_use]
    pub fn new(rank: usize, group: &Group, members: Vec<MemberSummary>) -> Self {
        Self {
            rank,
            id: group.id.clone(),
            name: group.name.clone(),
            group_score: group.group_score,
            members,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupBoard {
    pub window: usize,
    pub entries: Vec<GroupEntry>,
    pub degraded: bool,
}
