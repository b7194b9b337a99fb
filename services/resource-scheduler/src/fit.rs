//! Cpu fit filter.
//!
//! A node fits a pod when its allocatable cpu minus the cpu already requested
//! by pods bound to it covers the pod's own request. Memory and other
//! resources are not checked.

use tracing::{debug, warn};

use crate::cluster::types::Node;
use crate::cluster::Pod;
use crate::events::EventReporter;
use crate::quantity::{self, CPU};
use crate::snapshot::{requested_milli_cpu, ClusterSnapshot, SnapshotError};

/// Result of filtering the snapshot for one pod.
#[derive(Debug, Clone, Default)]
pub struct FitResult {
    /// Nodes with enough free cpu, in snapshot order.
    pub nodes: Vec<Node>,

    /// One human-readable reason per rejected node.
    pub failures: Vec<String>,
}

impl FitResult {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Message for the `FailedScheduling` event.
    pub fn failure_message(&self, pod: &Pod) -> String {
        let mut message = format!("pod ({}) failed to fit in any node", pod.metadata.name);
        for failure in &self.failures {
            message.push('\n');
            message.push_str(failure);
        }
        message
    }
}

/// Free milli-cores on a node after subtracting what is already committed.
pub fn free_milli_cpu(node: &Node, snapshot: &ClusterSnapshot) -> Result<i64, quantity::QuantityError> {
    let allocatable = node
        .status
        .allocatable
        .get(CPU)
        .map(String::as_str)
        .unwrap_or_default();
    let allocatable = quantity::allocatable_milli_cpu(allocatable)?;
    Ok(allocatable.saturating_sub(snapshot.usage_of(node.name()).milli_cpu))
}

/// Keep the ready nodes that can take the pod's cpu request.
///
/// An error is returned only when the pod's own requests cannot be parsed.
pub fn filter_nodes(pod: &Pod, snapshot: &ClusterSnapshot) -> Result<FitResult, SnapshotError> {
    let required = requested_milli_cpu(pod)?;
    let mut result = FitResult::default();

    for node in &snapshot.nodes {
        let free = match free_milli_cpu(node, snapshot) {
            Ok(free) => free,
            Err(e) => {
                warn!(node = %node.name(), error = %e, "Skipping node with unreadable capacity");
                result
                    .failures
                    .push(format!("fit failure on node ({}): {}", node.name(), e));
                continue;
            }
        };

        if free < required {
            debug!(
                node = %node.name(),
                free_millicores = free,
                required_millicores = required,
                "Insufficient cpu"
            );
            result.failures.push(format!(
                "fit failure on node ({}): Insufficient CPU",
                node.name()
            ));
            continue;
        }

        result.nodes.push(node.clone());
    }

    Ok(result)
}

/// Filter the snapshot and, when no node fits, publish one
/// `FailedScheduling` warning carrying every rejection reason.
pub async fn fit(
    pod: &Pod,
    snapshot: &ClusterSnapshot,
    reporter: &EventReporter,
) -> Result<FitResult, SnapshotError> {
    let result = filter_nodes(pod, snapshot)?;
    if result.is_empty() {
        let message = result.failure_message(pod);
        warn!(pod = %pod.metadata.name, reasons = ?result.failures, "Pod does not fit any node");
        if let Err(e) = reporter.failed_scheduling(pod, &message).await {
            warn!(pod = %pod.metadata.name, error = %e, "Failed to record FailedScheduling event");
        }
    }
    Ok(result)
}
