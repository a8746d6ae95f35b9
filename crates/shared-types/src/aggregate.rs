//! # Aggregate Contract
//!
//! Every independently stored entity (Contest, User, Group) implements
//! [`Aggregate`]. The cache layer, the resilience wrapper and the store
//! adapters are generic over it, so the three aggregates share one read path.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

/// The kind of an aggregate.
///
/// Used as the cache region name, as the circuit-breaker dependency key and
/// in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateKind {
    Contest,
    User,
    Group,
    Post,
}

impl AggregateKind {
    /// Name of the downstream dependency that owns this aggregate.
    ///
    /// One circuit breaker exists per dependency name.
    #[must_use]
    pub fn dependency_name(self) -> &'static str {
        match self {
            Self::Contest => "contestService",
            Self::User => "userService",
            Self::Group => "groupService",
            Self::Post => "postService",
        }
    }

    /// Lowercase region name used for caching and metrics labels.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Contest => "contest",
            Self::User => "user",
            Self::Group => "group",
            Self::Post => "post",
        }
    }
}

impl fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An independently stored, independently updatable entity.
pub trait Aggregate: Clone + fmt::Debug + Send + Sync + 'static {
    /// Identifier type.
    type Id: Clone + Eq + Hash + Ord + fmt::Display + fmt::Debug + Send + Sync + 'static;

    /// Kind tag of this aggregate.
    const KIND: AggregateKind;

    /// The aggregate id.
    fn id(&self) -> &Self::Id;

    /// Optimistic-concurrency version, bumped by the store on every write.
    fn version(&self) -> u64;

    /// Overwrite the version (store adapters only).
    fn set_version(&mut self, version: u64);
}

/// An aggregate carrying an integer score accumulator.
pub trait Scored: Aggregate {
    /// Current score total.
    fn score(&self) -> i64;

    /// Overwrite the score total (store adapters only).
    fn set_score(&mut self, score: i64);
}
