//! Recovery sweeper.
//!
//! Calls `recover_incomplete` every `sweep_interval` until shutdown. A sweep
//! that fails (intent store degraded) is logged and retried on the next tick.

use std::sync::Arc;
use std::time::Duration;

use cl_03_contest::{RecoveryReport, SubmissionApi};
use platform_telemetry::log_event;
use tokio::sync::watch;
use tracing::{debug, info};

pub struct RecoverySweeper {
    submissions: Arc<dyn SubmissionApi>,
    interval: Duration,
}

impl RecoverySweeper {
    pub fn new(submissions: Arc<dyn SubmissionApi>, interval: Duration) -> Self {
        Self {
            submissions,
            interval,
        }
    }

    /// One sweep. `None` when the sweep itself failed.
    pub async fn sweep_once(&self) -> Option<RecoveryReport> {
        match self.submissions.recover_incomplete().await {
            Ok(report) => {
                if report.recovered > 0 || report.dead_lettered > 0 {
                    log_event!(
                        info,
                        "runtime",
                        "Recovery sweep finished",
                        scanned = report.scanned,
                        recovered = report.recovered,
                        still_pending = report.still_pending,
                        dead_lettered = report.dead_lettered
                    );
                } else {
                    debug!(scanned = report.scanned, "Recovery sweep found nothing to do");
                }
                Some(report)
            }
            Err(e) => {
                log_event!(warn, "runtime", "Recovery sweep failed", error = %e);
                None
            }
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_ms = self.interval.as_millis() as u64, "Recovery sweeper started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Recovery sweeper stopping");
                        return;
                    }
                }
            }
        }
    }
}
