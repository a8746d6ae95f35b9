//! # CodeLearn Test Suite
//!
//! Cross-subsystem flows run against a fully wired `ServiceContainer` on a
//! manual clock.
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── fixtures.rs          # wired world + seeding helpers
//!     ├── submission_flows.rs  # saga, retries, recovery, breakers
//!     └── read_flows.rs        # cache freshness, leaderboards, status, events
//! ```
//!
//! ```bash
//! cargo test -p platform-tests
//! cargo test -p platform-tests integration::submission_flows
//! ```

pub mod integration;
