//! # Contests (cl-03)
//!
//! Contest State Machine, Submission Processor and contest lifecycle.
//!
//! ## Architecture
//!
//! ```text
//!                    ┌────────────────────────────────────────────────┐
//!   submit ────────► │ SubmissionProcessor                            │
//!                    │   eligibility (status derived from the clock)  │
//!                    │   ScoreIntent ──► IntentStore                  │
//!                    │   drive: contest ─► user ─► group              │
//!                    └───────┬───────────────┬─────────────┬──────────┘
//!                            │               │             │
//!                  ContestReader       ScoreApi (cl-04)   EventPublisher
//!                  (cache + guard)
//! ```
//!
//! ## Consistency
//!
//! | Property | How |
//! |----------|-----|
//! | participating-group score == sum of its submissions | both change in one contest-document update |
//! | exactly-once per request | idempotency key -> one intent; every step keyed by intent id |
//! | no silently lost partial update | pending intents are resumed by retry, `resume` or the recovery sweep |
//! | status never stale on read | derived from `(now, start, end)` on every read |

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::InMemoryIntentStore;
pub use domain::{
    check_eligibility, derive_status, ensure_active, Eligibility, IdempotencyKey, IntentState,
    SagaStep, ScoreIntent,
};
pub use ports::{
    ContestApi, IntentInsert, IntentStore, NewContest, RecoveryReport, SubmissionApi,
    SubmissionReceipt, SubmitRequest,
};
pub use service::{ContestLifecycle, SagaConfig, SubmissionProcessor};
