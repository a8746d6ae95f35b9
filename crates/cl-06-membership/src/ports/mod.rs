//! Ports for the membership subsystem.
//!
//! - `inbound`: user and group APIs

pub mod inbound;

pub use inbound::{GroupApi, UserApi};
