//! Prometheus metrics for CodeLearn subsystems.
//!
//! All metrics follow the naming convention: `cl_<area>_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts,
    Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // CACHE METRICS
    // =========================================================================

    /// Cache lookups by region and outcome
    pub static ref CACHE_LOOKUPS: CounterVec = CounterVec::new(
        Opts::new("cl_cache_lookups_total", "Cache lookups"),
        &["region", "outcome"]  // outcome: hit/miss
    ).expect("metric creation failed");

    /// Cache invalidations by region and scope
    pub static ref CACHE_INVALIDATIONS: CounterVec = CounterVec::new(
        Opts::new("cl_cache_invalidations_total", "Cache invalidations"),
        &["region", "scope"]  // scope: key/region
    ).expect("metric creation failed");

    /// Puts rejected because an invalidation happened after the load began
    pub static ref CACHE_STALE_PUTS: CounterVec = CounterVec::new(
        Opts::new("cl_cache_stale_puts_rejected_total", "Stale cache fills rejected"),
        &["region"]
    ).expect("metric creation failed");

    // =========================================================================
    // RESILIENCE METRICS
    // =========================================================================

    /// Circuit state transitions
    pub static ref CIRCUIT_TRANSITIONS: CounterVec = CounterVec::new(
        Opts::new("cl_circuit_transitions_total", "Circuit breaker state transitions"),
        &["dependency", "to_state"]
    ).expect("metric creation failed");

    /// Guarded store calls by dependency and outcome
    pub static ref STORE_CALLS: CounterVec = CounterVec::new(
        Opts::new("cl_store_calls_total", "Guarded store calls"),
        &["dependency", "outcome"]  // outcome: ok/failure/timeout/short_circuited
    ).expect("metric creation failed");

    /// Guarded store call latency
    pub static ref STORE_CALL_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "cl_store_call_duration_seconds",
            "Latency of guarded store calls"
        ).buckets(exponential_buckets(0.0001, 2.0, 15).unwrap_or_default()),
        &["dependency"]
    ).expect("metric creation failed");

    // =========================================================================
    // SCORING METRICS
    // =========================================================================

    /// Submissions by outcome
    pub static ref SUBMISSIONS: CounterVec = CounterVec::new(
        Opts::new("cl_contest_submissions_total", "Contest submissions"),
        &["outcome"]  // outcome: accepted/replayed/rejected/pending
    ).expect("metric creation failed");

    /// Score intents by terminal outcome
    pub static ref SCORE_INTENTS: CounterVec = CounterVec::new(
        Opts::new("cl_contest_score_intents_total", "Score intents"),
        &["outcome"]  // outcome: completed/recovered/dead_lettered
    ).expect("metric creation failed");

    /// Incomplete intents seen by the last recovery sweep
    pub static ref PENDING_INTENTS: Gauge = Gauge::new(
        "cl_contest_pending_intents",
        "Incomplete score intents at last sweep"
    ).expect("metric creation failed");

    /// Score deltas applied by aggregate kind
    pub static ref SCORE_DELTAS: CounterVec = CounterVec::new(
        Opts::new("cl_scoring_deltas_applied_total", "Score deltas applied"),
        &["kind", "result"]  // result: applied/duplicate
    ).expect("metric creation failed");

    /// Leaderboard queries by board and outcome
    pub static ref LEADERBOARD_QUERIES: CounterVec = CounterVec::new(
        Opts::new("cl_leaderboard_queries_total", "Leaderboard queries"),
        &["board", "outcome"]  // outcome: ok/degraded
    ).expect("metric creation failed");

    // =========================================================================
    // EVENT METRICS
    // =========================================================================

    /// Events published by exchange
    pub static ref EVENTS_PUBLISHED: CounterVec = CounterVec::new(
        Opts::new("cl_events_published_total", "Events published"),
        &["exchange", "routing_key"]
    ).expect("metric creation failed");

    /// Duplicate deliveries dropped by consumers
    pub static ref DUPLICATE_EVENTS: Counter = Counter::new(
        "cl_events_duplicates_dropped_total",
        "Duplicate event deliveries dropped"
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Cache
        Box::new(CACHE_LOOKUPS.clone()),
        Box::new(CACHE_INVALIDATIONS.clone()),
        Box::new(CACHE_STALE_PUTS.clone()),
        // Resilience
        Box::new(CIRCUIT_TRANSITIONS.clone()),
        Box::new(STORE_CALLS.clone()),
        Box::new(STORE_CALL_DURATION.clone()),
        // Scoring
        Box::new(SUBMISSIONS.clone()),
        Box::new(SCORE_INTENTS.clone()),
        Box::new(PENDING_INTENTS.clone()),
        Box::new(SCORE_DELTAS.clone()),
        Box::new(LEADERBOARD_QUERIES.clone()),
        // Events
        Box::new(EVENTS_PUBLISHED.clone()),
        Box::new(DUPLICATE_EVENTS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Encode all registered metrics in Prometheus text format.
pub fn gather_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
