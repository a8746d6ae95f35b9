//! Ports for the scoring subsystem.
//!
//! - `inbound`: the API other subsystems call

pub mod inbound;

pub use inbound::ScoreApi;
