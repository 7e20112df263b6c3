//! # Pass Scheduler
//!
//! Runs a pass immediately and then once per interval, measured from the
//! start of the previous pass. A pass that overruns the interval is followed
//! by the next one without sleeping; passes never overlap.

use crate::{coordinator::SyncCoordinator, SyncError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Periodic driver for [`SyncCoordinator::run_pass`].
pub struct SyncScheduler {
    coordinator: Arc<SyncCoordinator>,
    interval: Duration,
}

impl SyncScheduler {
    pub fn new(coordinator: Arc<SyncCoordinator>, interval: Duration) -> Self {
        Self {
            coordinator,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Loop until `token` is cancelled.
    ///
    /// Failed passes are logged and the loop carries on; the next pass
    /// retries from wherever the cursor was left.
    pub async fn run(&self, token: CancellationToken) {
        info!(interval_ms = self.interval.as_millis() as u64, "Sync scheduler started");

        loop {
            if token.is_cancelled() {
                break;
            }

            let started = Instant::now();
            match self.coordinator.run_pass(&token).await {
                Ok(report) => {
                    info!(
                        pass_id = %report.pass_id,
                        has_errors = report.has_errors(),
                        "Scheduled pass finished"
                    );
                }
                Err(SyncError::Cancelled) => break,
                Err(SyncError::PassInProgress) => {
                    warn!("Skipping scheduled pass, another pass is still running");
                }
                Err(e) => {
                    error!(error = %e, "Scheduled pass failed");
                }
            }

            let wait = self.interval.saturating_sub(started.elapsed());
            debug!(wait_ms = wait.as_millis() as u64, "Waiting for next pass");

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        info!("Sync scheduler stopped");
    }

    /// Run the loop on a tokio task.
    pub fn spawn(self) -> SchedulerHandle {
        let token = CancellationToken::new();
        let child = token.clone();
        let handle = tokio::spawn(async move { self.run(child).await });

        SchedulerHandle { token, handle }
    }
}

/// Handle to a spawned [`SyncScheduler`].
pub struct SchedulerHandle {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Token observed by the running loop; cancelling it also stops any
    /// in-flight pass at its next check.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Cancel the loop and wait for it to exit.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            error!(error = %e, "Sync scheduler task ended abnormally");
        }
    }
}
