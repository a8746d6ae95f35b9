//! # Platform Telemetry
//!
//! Observability for the CodeLearn platform.
//!
//! ## Components
//!
//! - **Logs**: `tracing` with an `EnvFilter`, pretty or JSON output
//! - **Traces**: optional OTLP span export (feature `otlp`)
//! - **Metrics**: Prometheus registry exposed via [`gather_metrics`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! use platform_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(TelemetryConfig::from_env())?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CL_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//! | `CL_JSON_LOGS` | `false` (`true` in containers) | JSON log output |
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | unset | OTLP endpoint (feature `otlp`) |
//! | `OTEL_SERVICE_NAME` | `codelearn` | Service name |

mod config;
mod logging;
pub mod metrics;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use metrics::{
    gather_metrics, register_metrics, CACHE_INVALIDATIONS, CACHE_LOOKUPS, CACHE_STALE_PUTS,
    CIRCUIT_TRANSITIONS, DUPLICATE_EVENTS, EVENTS_PUBLISHED, LEADERBOARD_QUERIES, PENDING_INTENTS,
    SCORE_DELTAS, SCORE_INTENTS, STORE_CALLS, STORE_CALL_DURATION, SUBMISSIONS,
};
pub use tracing_setup::TracingGuard;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize tracing: {0}")]
    TracerInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize metrics and the global tracing subscriber.
///
/// Returns a guard that must be held for the lifetime of the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    register_metrics()?;
    let tracing = tracing_setup::init_tracing(&config)?;
    Ok(TelemetryGuard { _tracing: tracing })
}

/// Guard that keeps telemetry active. Drop to flush and shutdown.
pub struct TelemetryGuard {
    _tracing: TracingGuard,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry");
    }
}
