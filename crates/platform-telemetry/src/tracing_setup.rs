//! Tracing subscriber setup.
//!
//! Builds one global registry: an `EnvFilter`, an optional OpenTelemetry
//! layer (feature `otlp`), and either a JSON or a pretty `fmt` layer.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{TelemetryConfig, TelemetryError};

/// Guard that flushes and shuts down span export on drop.
pub struct TracingGuard {
    #[cfg(feature = "otlp")]
    provider: Option<opentelemetry_sdk::trace::TracerProvider>,
}

impl Drop for TracingGuard {
    fn drop(&mut self) {
        #[cfg(feature = "otlp")]
        if let Some(provider) = self.provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("Error shutting down tracer provider: {:?}", e);
            }
        }
    }
}

fn env_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(&config.log_level).map_err(|e| TelemetryError::Config(e.to_string()))
}

/// Initialize the global tracing subscriber.
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(config: &TelemetryConfig) -> Result<TracingGuard, TelemetryError> {
    let filter = env_filter(config)?;

    let json_layer = (config.console_output && config.json_logs).then(|| {
        fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
    });

    let pretty_layer = (config.console_output && !config.json_logs).then(|| {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
    });

    #[cfg(feature = "otlp")]
    {
        let (otel_layer, provider) = match &config.otlp_endpoint {
            Some(endpoint) => {
                let (layer, provider) = otlp::layer(config, endpoint)?;
                (Some(layer), Some(provider))
            }
            None => (None, None),
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(otel_layer)
            .with(json_layer)
            .with(pretty_layer)
            .try_init()
            .map_err(|e| TelemetryError::TracerInit(e.to_string()))?;

        tracing::info!(
            service = %config.service_name,
            otlp = config.otlp_endpoint.is_some(),
            "Tracing initialized"
        );

        Ok(TracingGuard { provider })
    }

    #[cfg(not(feature = "otlp"))]
    {
        tracing_subscriber::registry()
            .with(filter)
            .with(json_layer)
            .with(pretty_layer)
            .try_init()
            .map_err(|e| TelemetryError::TracerInit(e.to_string()))?;

        tracing::info!(service = %config.service_name, "Tracing initialized");

        Ok(TracingGuard {})
    }
}

#[cfg(feature = "otlp")]
mod otlp {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::{
        runtime,
        trace::{self, RandomIdGenerator, Sampler, TracerProvider},
        Resource,
    };
    use tracing_opentelemetry::OpenTelemetryLayer;
    use tracing_subscriber::Registry;

    use crate::{TelemetryConfig, TelemetryError};

    type OtelLayer = OpenTelemetryLayer<
        tracing_subscriber::layer::Layered<tracing_subscriber::EnvFilter, Registry>,
        opentelemetry_sdk::trace::Tracer,
    >;

    pub(super) fn layer(
        config: &TelemetryConfig,
        endpoint: &str,
    ) -> Result<(OtelLayer, TracerProvider), TelemetryError> {
        let exporter = opentelemetry_otlp::new_exporter()
            .tonic()
            .with_endpoint(endpoint);

        let provider = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(exporter)
            .with_trace_config(
                trace::Config::default()
                    .with_sampler(Sampler::AlwaysOn)
                    .with_id_generator(RandomIdGenerator::default())
                    .with_resource(Resource::new(vec![
                        KeyValue::new("service.name", config.service_name.clone()),
                        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                        KeyValue::new("deployment.environment", config.environment.clone()),
                    ])),
            )
            .install_batch(runtime::Tokio)
            .map_err(|e| TelemetryError::TracerInit(e.to_string()))?;

        let tracer = provider.tracer(config.service_name.clone());
        Ok((tracing_opentelemetry::layer().with_tracer(tracer), provider))
    }
}
