//! Store adapters.
//!
//! - `memory`: in-memory document stores, one per aggregate type
//! - `fault`: fault injection shared by the in-memory stores

pub mod fault;
pub mod memory;

pub use fault::{Access, FaultInjector, FaultMode, FaultScope};
pub use memory::{
    InMemoryContestStore, InMemoryGroupStore, InMemoryStore, InMemoryUserStore, Indexed,
    DEFAULT_OP_RETENTION,
};
