//! Contest domain: status derivation, submission eligibility and the
//! score-intent saga record.

pub mod eligibility;
pub mod intent;
pub mod status;

pub use eligibility::{check_eligibility, ensure_active, Eligibility};
pub use intent::{IdempotencyKey, IntentState, SagaStep, ScoreIntent};
pub use status::{derive_status, next_persisted, status_of, with_live_status};
