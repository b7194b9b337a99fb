//! Scheduling orchestrator.
//!
//! Every decision runs under a single lock owned by the [`Scheduler`]:
//! - Burst guard (may defer the pod onto the retry queue)
//! - Fresh cluster snapshot and cpu fit filter
//! - Node selection
//! - Binding and `Scheduled` event
//!
//! Callers take the lock with [`Scheduler::lock`] and run one or more passes
//! through the returned [`DecisionGuard`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex, MutexGuard};
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use crate::annotations::PodHints;
use crate::burst::{BurstDecision, BurstGuard};
use crate::cluster::{ApiError, Binding, ClusterApi, Pod};
use crate::events::EventReporter;
use crate::fit;
use crate::scorer;
use crate::snapshot::{read_snapshot, SnapshotError};

/// Result type for scheduling passes.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Errors that abort a scheduling pass.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// Reading cluster state failed, or the pod's requests are malformed.
    #[error("cluster snapshot: {0}")]
    Snapshot(#[from] SnapshotError),

    /// The binding was rejected; the pod stays unbound.
    #[error("binding pod {pod} to node {node}: {source}")]
    Bind {
        pod: String,
        node: String,
        #[source]
        source: ApiError,
    },
}

/// Non-error result of a scheduling pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// The pod was bound to `node`.
    Scheduled { node: String },

    /// Burst protection is active; the pod was put back on the retry queue.
    Deferred { elapsed: Duration, window: Duration },

    /// No node can take the pod right now.
    Unschedulable { reason: String },
}

/// The scheduler and its decision lock.
pub struct Scheduler {
    api: Arc<dyn ClusterApi>,
    reporter: EventReporter,
    name: String,
    retry_tx: mpsc::Sender<Pod>,
    decision: Mutex<BurstGuard>,
}

impl Scheduler {
    /// Create a scheduler that requeues deferred pods on `retry_tx`.
    pub fn new(api: Arc<dyn ClusterApi>, name: impl Into<String>, retry_tx: mpsc::Sender<Pod>) -> Self {
        let name = name.into();
        Self {
            reporter: EventReporter::new(Arc::clone(&api), name.clone()),
            api,
            name,
            retry_tx,
            decision: Mutex::new(BurstGuard::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn api(&self) -> &Arc<dyn ClusterApi> {
        &self.api
    }

    /// Acquire the decision lock. Only one guard exists at a time.
    pub async fn lock(&self) -> DecisionGuard<'_> {
        DecisionGuard {
            scheduler: self,
            burst: self.decision.lock().await,
        }
    }

    fn requeue(&self, pod: &Pod) {
        match self.retry_tx.try_send(pod.clone()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(
                    pod = %pod.metadata.name,
                    "Retry queue full, leaving pod to the reconciliation sweep"
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(pod = %pod.metadata.name, "Retry queue closed, dropping pod");
            }
        }
    }

    async fn commit(&self, pod: &Pod, node_name: &str) -> SchedulerResult<()> {
        let binding = Binding::new(pod, node_name);
        self.api
            .create_binding(&binding)
            .await
            .map_err(|source| SchedulerError::Bind {
                pod: pod.metadata.name.clone(),
                node: node_name.to_string(),
                source,
            })?;

        info!(
            pod = %pod.metadata.name,
            namespace = %pod.metadata.namespace,
            node = %node_name,
            "Successfully assigned pod"
        );

        if let Err(e) = self.reporter.scheduled(pod, node_name).await {
            warn!(pod = %pod.metadata.name, error = %e, "Failed to record Scheduled event");
        }
        Ok(())
    }
}

/// Exclusive access to the decision pipeline.
pub struct DecisionGuard<'a> {
    scheduler: &'a Scheduler,
    burst: MutexGuard<'a, BurstGuard>,
}

impl DecisionGuard<'_> {
    /// Run one scheduling pass for `pod`.
    #[instrument(skip_all, fields(pod = %pod.metadata.name, namespace = %pod.metadata.namespace))]
    pub async fn schedule_pod(&mut self, pod: &Pod) -> SchedulerResult<ScheduleOutcome> {
        let scheduler = self.scheduler;
        let now = Instant::now();
        let hints = PodHints::from_annotations(&scheduler.name, &pod.metadata.annotations);

        if let BurstDecision::Wait { elapsed, window } = self.burst.check(now, hints.burst_protect) {
            info!(
                elapsed_secs = elapsed.as_secs_f64(),
                burst_secs = window.as_secs_f64(),
                "Burst detected, deferring pod"
            );
            scheduler.requeue(pod);
            return Ok(ScheduleOutcome::Deferred { elapsed, window });
        }

        let snapshot = read_snapshot(scheduler.api.as_ref()).await?;
        let fit = fit::fit(pod, &snapshot, &scheduler.reporter).await?;
        if fit.is_empty() {
            return Ok(ScheduleOutcome::Unschedulable {
                reason: format!("pod ({}) failed to fit in any node", pod.metadata.name),
            });
        }

        let Some(node) = scorer::best_node(pod, hints.bounds, &scheduler.name, &fit.nodes) else {
            warn!("No fitting node matches the node selector");
            return Ok(ScheduleOutcome::Unschedulable {
                reason: format!("pod ({}) matches no node selector", pod.metadata.name),
            });
        };

        scheduler.commit(pod, node.name()).await?;
        self.burst.record(now);

        Ok(ScheduleOutcome::Scheduled {
            node: node.name().to_string(),
        })
    }

    /// Time of the last successful placement.
    pub fn last_placement(&self) -> Option<Instant> {
        self.burst.last_placement()
    }
}
