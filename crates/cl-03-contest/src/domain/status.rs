//! Contest State Machine.
//!
//! ```text
//!   now < start            start <= now < end          now >= end
//!  ┌──────────┐  start   ┌──────────┐   end    ┌───────────┐
//!  │ UPCOMING │ ───────► │ ONGOING  │ ───────► │ COMPLETED │ (terminal)
//!  └──────────┘          └──────────┘          └───────────┘
//! ```
//!
//! Status is a pure function of `(now, start, end)` and is computed on every
//! read. The persisted field is informative only.

use shared_types::{Contest, ContestStatus, Timestamp};

/// Status of a contest bounded by `[start, end)` at time `now`.
#[must_use]
pub fn derive_status(now: Timestamp, start: Timestamp, end: Timestamp) -> ContestStatus {
    if now < start {
        ContestStatus::Upcoming
    } else if now < end {
        ContestStatus::Ongoing
    } else {
        ContestStatus::Completed
    }
}

/// Live status of `contest`.
#[must_use]
pub fn status_of(contest: &Contest, now: Timestamp) -> ContestStatus {
    derive_status(now, contest.start_time, contest.end_time)
}

/// Status to persist on refresh. A stored status is never moved backwards,
/// so a stored `Completed` stays `Completed`.
#[must_use]
pub fn next_persisted(stored: ContestStatus, derived: ContestStatus) -> ContestStatus {
    stored.max(derived)
}

/// Copy of `contest` with its status field set to the live status.
#[must_use]
pub fn with_live_status(mut contest: Contest, now: Timestamp) -> Contest {
    contest.status = status_of(&contest, now);
    contest
}
