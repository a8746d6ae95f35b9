//! Scoring domain: what can be scored and how much an activity is worth.

pub mod activity;

pub use activity::{Activity, ActivityKind};

use shared_types::{AggregateKind, GroupId, UserId};
use std::fmt;

/// The accumulator a delta is applied to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScoreTarget {
    /// `User.coding_score`
    User(UserId),
    /// `Group.group_score`
    Group(GroupId),
}

impl ScoreTarget {
    #[must_use]
    pub fn kind(&self) -> AggregateKind {
        match self {
            Self::User(_) => AggregateKind::User,
            Self::Group(_) => AggregateKind::Group,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::User(id) => id.as_str(),
            Self::Group(id) => id.as_str(),
        }
    }
}

impl fmt::Display for ScoreTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

/// Result of one `add_score` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreOutcome {
    pub target: ScoreTarget,
    pub delta: i64,
    pub new_total: i64,
    /// False when the operation key had been applied before.
    pub applied: bool,
}
