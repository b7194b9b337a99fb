//! Retry queue for pods deferred by burst protection.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, info};

use super::{paced_schedule, shutdown_signal};
use crate::cluster::Pod;
use crate::scheduler::Scheduler;

/// Create a bounded retry queue.
///
/// The sender goes to the [`Scheduler`]; the receiving half is shared by the
/// worker pool.
pub fn retry_queue(capacity: usize) -> (mpsc::Sender<Pod>, RetryQueue) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        tx,
        RetryQueue {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Receiving half of the retry queue, cloneable across workers.
#[derive(Clone)]
pub struct RetryQueue {
    rx: Arc<Mutex<mpsc::Receiver<Pod>>>,
}

impl RetryQueue {
    /// Wait for the next deferred pod. `None` once every sender is dropped.
    pub async fn next(&self) -> Option<Pod> {
        self.rx.lock().await.recv().await
    }
}

/// Drain the retry queue until shutdown.
pub async fn run_worker(
    worker_id: usize,
    scheduler: Arc<Scheduler>,
    queue: RetryQueue,
    pacing: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!(worker_id, "Retry worker started");

    loop {
        let pod = tokio::select! {
            pod = queue.next() => match pod {
                Some(pod) => pod,
                None => break,
            },
            _ = shutdown_signal(&mut shutdown) => break,
        };

        debug!(worker_id, pod = %pod.metadata.name, "Retrying deferred pod");
        tokio::select! {
            _ = paced_schedule(&scheduler, &pod, pacing) => {}
            _ = shutdown_signal(&mut shutdown) => break,
        }
    }

    info!(worker_id, "Retry worker stopped");
}
