//! Ports for the contest subsystem.
//!
//! - `inbound`: submission and lifecycle APIs
//! - `outbound`: intent persistence

pub mod inbound;
pub mod outbound;

pub use inbound::{
    ContestApi, NewContest, RecoveryReport, SubmissionApi, SubmissionReceipt, SubmitRequest,
};
pub use outbound::{IntentInsert, IntentStore};
