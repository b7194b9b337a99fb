//! Watch path: stream unscheduled pods and schedule them as they arrive.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::{paced_schedule, shutdown_signal};
use crate::cluster::{ClusterApi, Pod};
use crate::scheduler::Scheduler;

/// Keep a watch open on unscheduled pods and forward every `ADDED` pod.
///
/// A closed stream is reopened right away. A failed open or a broken stream
/// waits `backoff` before the next attempt.
pub async fn run_producer(
    api: Arc<dyn ClusterApi>,
    pods_tx: mpsc::Sender<Pod>,
    backoff: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("Starting pod watch");

    loop {
        let opened = tokio::select! {
            opened = api.watch_unscheduled_pods() => opened,
            _ = shutdown_signal(&mut shutdown) => break,
        };

        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, backoff_secs = backoff.as_secs(), "Failed to open pod watch");
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => continue,
                    _ = shutdown_signal(&mut shutdown) => break,
                }
            }
        };
        debug!("Pod watch opened");

        let broken = loop {
            let record = tokio::select! {
                record = stream.next() => record,
                _ = shutdown_signal(&mut shutdown) => {
                    info!("Pod watch shutting down");
                    return;
                }
            };

            match record {
                Some(Ok(event)) => {
                    if !event.is_added() {
                        continue;
                    }
                    debug!(pod = %event.object.metadata.name, "Pod added");
                    tokio::select! {
                        sent = pods_tx.send(event.object) => {
                            if sent.is_err() {
                                debug!("Watch consumer gone, stopping producer");
                                return;
                            }
                        }
                        _ = shutdown_signal(&mut shutdown) => return,
                    }
                }
                Some(Err(e)) => {
                    warn!(error = %e, decode = e.is_decode(), "Pod watch failed");
                    break true;
                }
                None => break false,
            }
        };

        if broken {
            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                _ = shutdown_signal(&mut shutdown) => break,
            }
        } else {
            debug!("Pod watch closed by server, reopening");
        }
    }

    info!("Pod watch stopped");
}

/// Schedule pods forwarded by [`run_producer`], one pass at a time.
pub async fn run_consumer(
    scheduler: Arc<Scheduler>,
    mut pods_rx: mpsc::Receiver<Pod>,
    pacing: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let pod = tokio::select! {
            pod = pods_rx.recv() => match pod {
                Some(pod) => pod,
                None => break,
            },
            _ = shutdown_signal(&mut shutdown) => break,
        };

        if !pod.is_managed_by(scheduler.name()) {
            debug!(pod = %pod.metadata.name, "Pod belongs to another scheduler");
            continue;
        }
        if pod.is_bound() {
            continue;
        }

        tokio::select! {
            _ = paced_schedule(&scheduler, &pod, pacing) => {}
            _ = shutdown_signal(&mut shutdown) => break,
        }
    }

    info!("Watch consumer stopped");
}
