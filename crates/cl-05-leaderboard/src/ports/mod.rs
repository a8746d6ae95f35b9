//! Ports for the leaderboard subsystem.
//!
//! - `inbound`: the query API

pub mod inbound;

pub use inbound::LeaderboardApi;
