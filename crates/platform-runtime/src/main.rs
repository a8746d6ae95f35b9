//! # CodeLearn Platform
//!
//! Entry point: telemetry, configuration, services, background handlers.

use anyhow::{Context, Result};
use platform_runtime::{PlatformConfig, PlatformRuntime};
use platform_telemetry::{init_telemetry, TelemetryConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry = init_telemetry(TelemetryConfig::from_env())
        .context("failed to initialize telemetry")?;

    let config = PlatformConfig::from_env().context("failed to load configuration")?;
    let runtime = PlatformRuntime::new(config).context("invalid configuration")?;
    runtime.start();

    info!("CodeLearn platform is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;

    runtime.shutdown().await;
    Ok(())
}
