//! # Shared Types Crate
//!
//! Domain entities, identifiers, the aggregate contract and the error
//! taxonomy shared by every CodeLearn subsystem.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-subsystem types are defined here.
//! - **Aggregates are independent**: Contest, User and Group are stored and
//!   updated separately; nothing here assumes a shared transaction.
//! - **Time is injected**: Status derivation and expiry take a [`TimeSource`].

pub mod aggregate;
pub mod entities;
pub mod errors;
pub mod ids;
pub mod time;

pub use aggregate::{Aggregate, AggregateKind, Scored};
pub use entities::*;
pub use errors::*;
pub use ids::*;
pub use time::*;
