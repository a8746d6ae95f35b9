//! # Error Types
//!
//! Two layers of errors are shared across subsystems:
//!
//! - [`StoreError`]: what a store adapter reports.
//! - [`PlatformError`]: what an operation surfaces to its caller.
//!
//! Only infrastructure failures (`Unavailable`, `Timeout`) count against a
//! dependency's circuit breaker. Domain outcomes such as a missing document
//! or a version conflict are healthy responses from the store.

use crate::aggregate::AggregateKind;
use crate::entities::ContestStatus;
use crate::ids::ContestId;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by store adapters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Document not found.
    #[error("{kind} not found: {id}")]
    NotFound { kind: AggregateKind, id: String },

    /// A unique field already exists.
    #[error("duplicate {kind} {field}: {value}")]
    Duplicate {
        kind: AggregateKind,
        field: &'static str,
        value: String,
    },

    /// Optimistic-concurrency check failed.
    #[error("version conflict on {kind} {id}: expected {expected}, found {actual}")]
    VersionConflict {
        kind: AggregateKind,
        id: String,
        expected: u64,
        actual: u64,
    },

    /// The backing store could not be reached.
    #[error("{dependency} unavailable: {reason}")]
    Unavailable { dependency: String, reason: String },

    /// The call exceeded its deadline.
    #[error("{dependency} timed out after {after:?}")]
    Timeout { dependency: String, after: Duration },
}

impl StoreError {
    /// Whether this error reflects a degraded dependency rather than a
    /// domain outcome.
    #[must_use]
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }

    pub fn unavailable(kind: AggregateKind, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            dependency: kind.dependency_name().to_string(),
            reason: reason.into(),
        }
    }

    pub fn not_found(kind: AggregateKind, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// Coarse error category surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    NotFound,
    BadRequest,
    Unauthorized,
    ServiceUnavailable,
    Internal,
}

/// Errors surfaced by platform operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    /// Referenced aggregate is absent.
    #[error("{kind} not found: {id}")]
    NotFound { kind: AggregateKind, id: String },

    /// A precondition was violated.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Submission outside the contest's active window.
    #[error("contest {contest_id} is not currently active (status: {status})")]
    ContestNotActive {
        contest_id: ContestId,
        status: ContestStatus,
    },

    /// Caller is not the owner of the resource.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A write-path dependency is degraded (circuit open or timeout).
    #[error("{dependency} unavailable: {reason}")]
    ServiceUnavailable { dependency: String, reason: String },

    /// Optimistic-concurrency retries were exhausted.
    #[error("too much contention on {kind} {id}")]
    Contention { kind: AggregateKind, id: String },

    /// Unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PlatformError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::BadRequest(_) | Self::ContestNotActive { .. } => ErrorCategory::BadRequest,
            Self::Unauthorized(_) => ErrorCategory::Unauthorized,
            Self::ServiceUnavailable { .. } | Self::Contention { .. } => {
                ErrorCategory::ServiceUnavailable
            }
            Self::Internal(_) => ErrorCategory::Internal,
        }
    }

    pub fn not_found(kind: AggregateKind, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unavailable(kind: AggregateKind, reason: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            dependency: kind.dependency_name().to_string(),
            reason: reason.into(),
        }
    }
}

impl From<StoreError> for PlatformError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { kind, id } => Self::NotFound { kind, id },
            StoreError::Duplicate { kind, field, value } => {
                Self::BadRequest(format!("{kind} with {field} '{value}' already exists"))
            }
            StoreError::VersionConflict { kind, id, .. } => Self::Contention { kind, id },
            StoreError::Unavailable { dependency, reason } => {
                Self::ServiceUnavailable { dependency, reason }
            }
            StoreError::Timeout { dependency, after } => Self::ServiceUnavailable {
                dependency,
                reason: format!("timed out after {after:?}"),
            },
        }
    }
}

/// Result alias for platform operations.
pub type PlatformResult<T> = Result<T, PlatformError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infrastructure_classification() {
        assert!(StoreError::unavailable(AggregateKind::User, "down").is_infrastructure());
        assert!(StoreError::Timeout {
            dependency: "userService".into(),
            after: Duration::from_millis(5),
        }
        .is_infrastructure());
        assert!(!StoreError::not_found(AggregateKind::User, "u1").is_infrastructure());
    }

    #[test]
    fn test_store_error_mapping() {
        let err: PlatformError = StoreError::unavailable(AggregateKind::Group, "refused").into();
        assert_eq!(err.category(), ErrorCategory::ServiceUnavailable);
        assert!(err.to_string().contains("groupService"));

        let err: PlatformError = StoreError::Duplicate {
            kind: AggregateKind::User,
            field: "email",
            value: "a@b.c".into(),
        }
        .into();
        assert_eq!(err.category(), ErrorCategory::BadRequest);

        let err: PlatformError = StoreError::VersionConflict {
            kind: AggregateKind::Group,
            id: "g1".into(),
            expected: 1,
            actual: 2,
        }
        .into();
        assert!(matches!(err, PlatformError::Contention { .. }));
    }

    #[test]
    fn test_contest_not_active_is_bad_request() {
        let err = PlatformError::ContestNotActive {
            contest_id: ContestId::new("c1"),
            status: ContestStatus::Upcoming,
        };
        assert_eq!(err.category(), ErrorCategory::BadRequest);
        assert!(err.to_string().contains("not currently active"));
    }
}
