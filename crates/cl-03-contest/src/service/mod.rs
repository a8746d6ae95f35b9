//! Contest services.
//!
//! - `submission`: Submission Processor and recovery sweep
//! - `lifecycle`: create / get / list / delete / refresh

pub mod lifecycle;
pub mod submission;

pub use lifecycle::ContestLifecycle;
pub use submission::{SagaConfig, SubmissionProcessor};
