//! # Score Aggregator (cl-04)
//!
//! Applies score deltas to the two standalone accumulators:
//!
//! - `User.coding_score`: contest submissions and community activity
//! - `Group.group_score`: contest submissions
//!
//! ```text
//!   add_score(target, delta, op)
//!        │
//!        ├──> guard.write(store.apply_score_delta(id, delta, op))   atomic, once per op
//!        └──> cache.invalidate_key(id)
//! ```
//!
//! Contest-embedded participating-group scores are not touched here; they
//! move together with the submission record in the contest store.

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::{Activity, ActivityKind, ScoreOutcome, ScoreTarget};
pub use ports::ScoreApi;
pub use service::ScoreAggregator;
