//! # CodeLearn Platform Runtime
//!
//! Builds the service container and runs the background handlers.
//!
//! ## Modular Structure
//!
//! - `container/` - configuration and service wiring
//! - `handlers/` - recovery sweeper and notification consumer
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (`PlatformConfig::from_env`)
//! 2. Validate it
//! 3. Build the services in dependency order
//! 4. Spawn the recovery sweeper and the notification consumer
//! 5. Run until shutdown is signalled

pub mod container;
pub mod handlers;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use shared_bus::EventFilter;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub use container::{BusConfig, ConfigError, PlatformConfig, ServiceContainer};
pub use handlers::{LogSink, NotificationConsumer, NotificationSink, RecoverySweeper};

/// How long `shutdown` waits for each handler to stop.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub struct PlatformRuntime {
    container: Arc<ServiceContainer>,
    sink: Arc<dyn NotificationSink>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl PlatformRuntime {
    /// Validate `config` and build every service.
    pub fn new(config: PlatformConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::with_container(Arc::new(ServiceContainer::new(config))))
    }

    /// Runtime around an existing container; notifications go to the log.
    pub fn with_container(container: Arc<ServiceContainer>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            container,
            sink: Arc::new(LogSink),
            shutdown_tx,
            shutdown_rx,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Route notifications to `sink` instead of the log.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Spawn the background handlers.
    pub fn start(&self) {
        let container = &self.container;

        let sweeper = RecoverySweeper::new(
            container.submissions.clone(),
            container.config.saga.sweep_interval,
        );
        let consumer = NotificationConsumer::new(
            container.bus.event_stream(EventFilter::all()),
            Arc::clone(&self.sink),
            container.time.clone(),
            container.config.bus.dedup_window_ms,
        );

        let mut tasks = self.tasks.lock();
        tasks.push(tokio::spawn(sweeper.run(self.shutdown_rx.clone())));
        tasks.push(tokio::spawn(consumer.run(self.shutdown_rx.clone())));

        info!(
            sweep_interval_ms = container.config.saga.sweep_interval.as_millis() as u64,
            "Background handlers started"
        );
    }

    /// Signal every handler and wait for them to stop.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");
        if self.shutdown_tx.send(true).is_err() {
            warn!("No handler was listening for shutdown");
        }

        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            match tokio::time::timeout(SHUTDOWN_GRACE, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "Handler task failed"),
                Err(_) => warn!("Handler did not stop within the grace period"),
            }
        }
        info!("Shutdown complete");
    }

    #[must_use]
    pub fn container(&self) -> Arc<ServiceContainer> {
        Arc::clone(&self.container)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = PlatformConfig::default();
        config.bus.channel_capacity = 0;
        assert!(PlatformRuntime::new(config).is_err());
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let runtime = PlatformRuntime::new(PlatformConfig::default()).unwrap();
        runtime.start();
        runtime.shutdown().await;
        assert!(runtime.tasks.lock().is_empty());
    }
}
