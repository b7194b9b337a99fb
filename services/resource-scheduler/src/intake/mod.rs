//! Intake paths feeding the scheduler.
//!
//! - **Watch**: a producer streams newly added unscheduled pods, a single
//!   consumer schedules them one by one
//! - **Retry queue**: a fixed pool of workers drains pods deferred by burst
//!   protection
//! - **Reconciliation sweep**: a periodic full listing catches anything the
//!   watch missed
//!
//! All paths take the scheduler's decision lock before every pass and stop
//! when the shutdown channel flips to `true`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::cluster::Pod;
use crate::config::Config;
use crate::scheduler::{ScheduleOutcome, Scheduler};

pub mod queue;
pub mod reconciler;
pub mod watch_pods;

pub use queue::{retry_queue, RetryQueue};
pub use reconciler::{ReconcileSweep, SweepStats};

/// Capacity of the hand-off between the watch producer and its consumer.
const WATCH_BUFFER: usize = 16;

/// Resolves once shutdown has been requested or the sender is gone.
pub async fn shutdown_signal(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Take the decision lock, wait out the pacing interval while holding it,
/// then run one pass for `pod`.
pub async fn paced_schedule(scheduler: &Scheduler, pod: &Pod, pacing: Duration) {
    let mut guard = scheduler.lock().await;
    if !pacing.is_zero() {
        tokio::time::sleep(pacing).await;
    }
    let result = guard.schedule_pod(pod).await;
    drop(guard);
    log_outcome(pod, result);
}

pub(crate) fn log_outcome(pod: &Pod, result: crate::scheduler::SchedulerResult<ScheduleOutcome>) {
    let name = &pod.metadata.name;
    match result {
        Ok(ScheduleOutcome::Scheduled { node }) => debug!(pod = %name, node = %node, "Pod scheduled"),
        Ok(ScheduleOutcome::Deferred { .. }) => debug!(pod = %name, "Pod deferred"),
        Ok(ScheduleOutcome::Unschedulable { reason }) => {
            warn!(pod = %name, reason = %reason, "Unable to schedule pod")
        }
        Err(e) => error!(pod = %name, error = %e, "Scheduling pass failed"),
    }
}

/// Spawn every intake task. The set drains once shutdown is signalled.
pub fn spawn_all(
    config: &Config,
    scheduler: Arc<Scheduler>,
    queue: RetryQueue,
    shutdown: watch::Receiver<bool>,
) -> JoinSet<()> {
    let mut tasks = JoinSet::new();
    let (pods_tx, pods_rx) = mpsc::channel(WATCH_BUFFER);

    tasks.spawn(watch_pods::run_producer(
        Arc::clone(scheduler.api()),
        pods_tx,
        config.watch_backoff,
        shutdown.clone(),
    ));

    tasks.spawn(watch_pods::run_consumer(
        Arc::clone(&scheduler),
        pods_rx,
        config.pacing,
        shutdown.clone(),
    ));

    for worker_id in 0..config.workers {
        tasks.spawn(queue::run_worker(
            worker_id,
            Arc::clone(&scheduler),
            queue.clone(),
            config.pacing,
            shutdown.clone(),
        ));
    }

    let sweep = ReconcileSweep::new(Arc::clone(&scheduler), config.reconcile_interval);
    tasks.spawn(async move { sweep.run(shutdown).await });

    info!(workers = config.workers, "Intake tasks started");
    tasks
}
