//! Leaderboard query scopes and the ranking order shared by stores and the
//! leaderboard engine.

use shared_types::{Scored, User};
use std::cmp::Ordering;
use std::fmt;

/// Which users a leaderboard covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UserScope {
    Global,
    College(String),
    CollegeDepartment { college: String, department: String },
}

impl UserScope {
    #[must_use]
    pub fn contains(&self, user: &User) -> bool {
        match self {
            Self::Global => true,
            Self::College(college) => &user.college == college,
            Self::CollegeDepartment {
                college,
                department,
            } => &user.college == college && &user.department == department,
        }
    }
}

impl fmt::Display for UserScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::College(c) => write!(f, "college:{c}"),
            Self::CollegeDepartment {
                college,
                department,
            } => write!(f, "college:{college}/department:{department}"),
        }
    }
}

/// Ranking order: score descending, then id ascending.
pub fn rank_order<A: Scored>(a: &A, b: &A) -> Ordering {
    b.score().cmp(&a.score()).then_with(|| a.id().cmp(b.id()))
}
