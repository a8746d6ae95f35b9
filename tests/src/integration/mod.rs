//! Integration flows.

pub mod fixtures;

mod read_flows;
mod submission_flows;
