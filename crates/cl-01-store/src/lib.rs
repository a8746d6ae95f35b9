//! # Store Adapters (cl-01)
//!
//! Persistence boundary for the three independently stored aggregates.
//!
//! ## Guarantees
//!
//! | Operation | Atomicity |
//! |-----------|-----------|
//! | `get` / `insert` / `delete` | one document |
//! | `replace` | one document, version-checked |
//! | `apply_score_delta` | one document, idempotent per operation key |
//! | `append_submission` | one contest document, idempotent per intent |
//!
//! Nothing here spans documents. Multi-aggregate consistency is the
//! submission saga's job.
//!
//! ## Crate Structure
//!
//! - `ports` - store traits the services depend on
//! - `adapters` - in-memory implementations with fault injection
//! - `cas` - version-checked update loop
//! - `query` - leaderboard scopes and ranking order

pub mod adapters;
pub mod cas;
pub mod ports;
pub mod query;

pub use adapters::{
    FaultInjector, FaultMode, FaultScope, InMemoryContestStore, InMemoryGroupStore,
    InMemoryStore, InMemoryUserStore, DEFAULT_OP_RETENTION,
};
pub use cas::{update_with_retry, Mutation, DEFAULT_CAS_ATTEMPTS};
pub use ports::{
    ContestStore, DocumentStore, GroupStore, ScoreApplied, ScoreStore, SubmissionAppend,
    UserStore,
};
pub use query::{rank_order, UserScope};
