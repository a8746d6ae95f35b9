//! Driving port: score aggregation.

use crate::domain::{Activity, ScoreOutcome, ScoreTarget};
use async_trait::async_trait;
use shared_types::{OperationKey, PlatformResult};

/// Score Aggregator API.
///
/// Every delta is keyed by an [`OperationKey`]; applying the same key twice
/// returns the current total without adding again.
#[async_trait]
pub trait ScoreApi: Send + Sync {
    /// Add `delta` to `target`'s accumulator and invalidate its cache entry.
    ///
    /// # Errors
    /// `NotFound` if the aggregate is missing, `ServiceUnavailable` if its
    /// store is degraded.
    async fn add_score(
        &self,
        target: ScoreTarget,
        delta: i64,
        op: &OperationKey,
    ) -> PlatformResult<ScoreOutcome>;

    /// Award the points for a community activity and announce the change.
    async fn record_activity(&self, activity: &Activity) -> PlatformResult<ScoreOutcome>;
}
