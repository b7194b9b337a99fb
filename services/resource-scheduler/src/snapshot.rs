//! Cluster snapshot taken at the start of every decision.
//!
//! The snapshot is never cached: each pass reads nodes, metrics and pods
//! afresh while holding the decision lock.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::cluster::{ApiError, ClusterApi, Pod};
use crate::cluster::types::Node;
use crate::quantity::{self, QuantityError, CPU};

/// Pod phases whose requests occupy node capacity.
const ACTIVE_PHASES: [&str; 2] = ["Running", "Pending"];

/// Errors that abort a snapshot read.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("cluster api: {0}")]
    Api(#[from] ApiError),

    #[error("pod {pod}: {source}")]
    Quantity {
        pod: String,
        #[source]
        source: QuantityError,
    },
}

/// Cpu committed to a node by the pods already bound to it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceUsage {
    /// Sum of milli-core requests.
    pub milli_cpu: i64,
}

/// Ready nodes plus the usage aggregate of every listed node.
#[derive(Debug, Clone, Default)]
pub struct ClusterSnapshot {
    pub nodes: Vec<Node>,
    pub usage: HashMap<String, ResourceUsage>,
}

impl ClusterSnapshot {
    /// Usage aggregate for a node; zero if nothing is bound to it.
    pub fn usage_of(&self, node_name: &str) -> ResourceUsage {
        self.usage.get(node_name).copied().unwrap_or_default()
    }
}

/// Read the current cluster state.
///
/// Metrics are best effort: a node whose metrics cannot be fetched keeps an
/// empty usage and is still considered. Failures listing nodes or pods abort
/// the read.
pub async fn read_snapshot(api: &dyn ClusterApi) -> Result<ClusterSnapshot, SnapshotError> {
    let listed = api.list_nodes().await?;

    let mut usage = HashMap::with_capacity(listed.len());
    let mut nodes = Vec::new();

    for mut node in listed {
        usage.insert(node.name().to_string(), ResourceUsage::default());

        match api.node_metrics(node.name()).await {
            Ok(metrics) => {
                debug!(
                    node = %node.name(),
                    cpu = %metrics.usage.cpu,
                    memory = %metrics.usage.memory,
                    "Node usage"
                );
                node.metrics = metrics;
            }
            Err(e) => {
                warn!(node = %node.name(), error = %e, "Failed to fetch node metrics");
            }
        }

        if node.is_ready() {
            debug!(node = %node.name(), "Node up");
            nodes.push(node);
        }
    }

    let pods = api.list_pods("").await?;
    for pod in pods.iter().filter(|p| is_active(p)) {
        let Some(entry) = usage.get_mut(&pod.spec.node_name) else {
            continue;
        };
        entry.milli_cpu = entry.milli_cpu.saturating_add(requested_milli_cpu(pod)?);
    }

    Ok(ClusterSnapshot { nodes, usage })
}

/// Total milli-core cpu requested by a pod's containers.
///
/// Whole-core requests are not counted, see [`quantity::milli_cpu_request`].
/// The sum saturates at `i64::MAX`.
pub fn requested_milli_cpu(pod: &Pod) -> Result<i64, SnapshotError> {
    let mut total: i64 = 0;
    for container in &pod.spec.containers {
        let Some(request) = container.resources.requests.get(CPU) else {
            continue;
        };
        let millis = quantity::milli_cpu_request(request).map_err(|source| {
            SnapshotError::Quantity {
                pod: pod.metadata.name.clone(),
                source,
            }
        })?;
        total = total.saturating_add(millis.unwrap_or(0));
    }
    Ok(total)
}

fn is_active(pod: &Pod) -> bool {
    pod.is_bound() && ACTIVE_PHASES.contains(&pod.status.phase.as_str())
}
