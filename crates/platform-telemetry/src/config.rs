//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for logging, tracing and metrics.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name for traces and logs
    pub service_name: String,

    /// Log level filter directive (e.g. `info`, `cl_03_contest=debug`)
    pub log_level: String,

    /// Whether to emit logs to stdout at all
    pub console_output: bool,

    /// Whether to emit JSON formatted logs
    pub json_logs: bool,

    /// OTLP collector endpoint; only used with the `otlp` feature
    pub otlp_endpoint: Option<String>,

    /// Deployment environment label (dev, staging, prod)
    pub environment: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "codelearn".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
            otlp_endpoint: None,
            environment: "dev".to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OTEL_SERVICE_NAME`: Service name (default: codelearn)
    /// - `CL_LOG_LEVEL` or `RUST_LOG`: Log filter (default: info)
    /// - `CL_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `CL_JSON_LOGS`: Enable JSON logs (default: false in dev, true in containers)
    /// - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: unset)
    /// - `CL_ENVIRONMENT`: Deployment environment (default: dev)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "codelearn".to_string()),

            log_level: env::var("CL_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            console_output: env::var("CL_CONSOLE_OUTPUT")
                .map(|v| parse_flag(&v, true))
                .unwrap_or(true),

            json_logs: env::var("CL_JSON_LOGS")
                .map(|v| parse_flag(&v, false))
                .unwrap_or(is_container),

            otlp_endpoint: env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .ok()
                .filter(|v| !v.is_empty()),

            environment: env::var("CL_ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()),
        }
    }

    /// Configuration for a named component (e.g. `contest`, `runtime`).
    pub fn for_component(component: &str) -> Self {
        let mut config = Self::from_env();
        config.service_name = format!("{}-{}", config.service_name, component);
        config
    }
}

fn parse_flag(value: &str, default: bool) -> bool {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => true,
        "false" | "0" | "no" => false,
        _ => default,
    }
}
