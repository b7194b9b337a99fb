//! Reconciliation sweep.
//!
//! Periodically lists every unbound pod that belongs to this scheduler and
//! runs a pass for each one under a single hold of the decision lock.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument};

use super::shutdown_signal;
use crate::cluster::{ApiError, UNSCHEDULED_SELECTOR};
use crate::scheduler::{ScheduleOutcome, Scheduler};

/// Counters for one sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepStats {
    pub listed: usize,
    pub scheduled: usize,
    pub deferred: usize,
    pub unschedulable: usize,
    pub failed: usize,
}

/// Periodic full sweep of unscheduled pods.
pub struct ReconcileSweep {
    scheduler: Arc<Scheduler>,
    interval: Duration,
}

impl ReconcileSweep {
    pub fn new(scheduler: Arc<Scheduler>, interval: Duration) -> Self {
        Self {
            scheduler,
            interval,
        }
    }

    /// Sweep every interval until shutdown is signaled.
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Starting reconciliation sweep"
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick fires immediately; the first sweep waits a full interval.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.sweep().await {
                        Ok(stats) if stats.listed > 0 => info!(
                            listed = stats.listed,
                            scheduled = stats.scheduled,
                            deferred = stats.deferred,
                            unschedulable = stats.unschedulable,
                            failed = stats.failed,
                            "Reconciliation sweep complete"
                        ),
                        Ok(_) => debug!("Reconciliation sweep found no pods"),
                        Err(e) => error!(error = %e, "Reconciliation sweep failed"),
                    }
                    // Next sweep is a full interval after this one finished.
                    interval.reset();
                }
                _ = shutdown_signal(&mut shutdown) => {
                    info!("Reconciliation sweep shutting down");
                    break;
                }
            }
        }
    }

    /// Run a single sweep.
    pub async fn sweep(&self) -> Result<SweepStats, ApiError> {
        let scheduler = &self.scheduler;
        let pods: Vec<_> = scheduler
            .api()
            .list_pods(UNSCHEDULED_SELECTOR)
            .await?
            .into_iter()
            .filter(|pod| !pod.is_bound() && pod.is_managed_by(scheduler.name()))
            .collect();

        let mut stats = SweepStats {
            listed: pods.len(),
            ..Default::default()
        };
        if pods.is_empty() {
            return Ok(stats);
        }

        let mut guard = scheduler.lock().await;
        for pod in &pods {
            match guard.schedule_pod(pod).await {
                Ok(ScheduleOutcome::Scheduled { .. }) => stats.scheduled += 1,
                Ok(ScheduleOutcome::Deferred { .. }) => stats.deferred += 1,
                Ok(ScheduleOutcome::Unschedulable { .. }) => stats.unschedulable += 1,
                Err(e) => {
                    error!(pod = %pod.metadata.name, error = %e, "Sweep pass failed");
                    stats.failed += 1;
                }
            }
        }

        Ok(stats)
    }
}
