//! # Leaderboard Query Engine (cl-05)
//!
//! Bounded top-N rankings and the caller's position inside the window.
//!
//! | Board | Scope | Window |
//! |-------|-------|--------|
//! | global | all users | 100 |
//! | college | caller's college | 100 |
//! | department | caller's college + one department | 100 |
//! | group | all groups | 50 |
//!
//! Ordering is score descending, then id ascending. A caller below the
//! window is reported `NotRanked`; that is a statement about the window, not
//! about whether a global position exists.

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::{
    rank_within, BoardScope, CallerSummary, GroupBoard, GroupEntry, MemberSummary, Rank,
    UserBoard, UserEntry,
};
pub use ports::LeaderboardApi;
pub use service::{LeaderboardConfig, LeaderboardService};
