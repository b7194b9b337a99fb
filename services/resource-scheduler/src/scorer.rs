//! Node selection among the nodes that fit.
//!
//! The pod's node selector is applied first; nodes that miss a label are
//! dropped. The remaining nodes are compared on their live usage metrics:
//!
//! - cpu-bound (pod or node) prefers strictly lower cpu usage
//! - memory-bound (pod or node) prefers strictly lower memory usage
//! - otherwise a node must beat the current best on both cpu and memory
//!
//! A node whose metrics cannot be parsed is skipped for comparison.

use tracing::{debug, info, warn};

use crate::annotations::BoundHints;
use crate::cluster::types::Node;
use crate::cluster::Pod;
use crate::quantity::{self, QuantityError};

/// Parsed usage of a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NodeUsage {
    cpu_nanos: i64,
    memory_kib: i64,
}

impl NodeUsage {
    fn of(node: &Node) -> Result<Self, QuantityError> {
        Ok(Self {
            cpu_nanos: quantity::cpu_usage_nanos(&node.metrics.usage.cpu)?,
            memory_kib: quantity::memory_usage_kib(&node.metrics.usage.memory)?,
        })
    }
}

/// Returns true if every selector entry of the pod is present on the node.
pub fn matches_selector(pod: &Pod, node: &Node) -> bool {
    pod.spec
        .node_selector
        .iter()
        .all(|(key, value)| node.metadata.labels.get(key) == Some(value))
}

/// Decide whether `candidate` replaces `best`.
///
/// The bound terms test the opposite flags with `||`, so only a pod and node
/// that are both cpu-bound and memory-bound fall through to the dominance
/// check alone.
fn should_switch(pod: BoundHints, node: BoundHints, best: NodeUsage, candidate: NodeUsage) -> bool {
    let cpu_lower = candidate.cpu_nanos < best.cpu_nanos;
    let memory_lower = candidate.memory_kib < best.memory_kib;

    let cpu_bound = (pod.cpu_bound || node.cpu_bound) && (!pod.memory_bound || !node.memory_bound);
    let memory_bound =
        (pod.memory_bound || node.memory_bound) && (!pod.cpu_bound || !node.cpu_bound);

    (cpu_bound && cpu_lower) || (memory_bound && memory_lower) || (memory_lower && cpu_lower)
}

/// Pick the node to bind `pod` to, or `None` if no node passes the selector.
pub fn best_node<'a>(
    pod: &Pod,
    pod_hints: BoundHints,
    scheduler_name: &str,
    nodes: &'a [Node],
) -> Option<&'a Node> {
    let pod_name = &pod.metadata.name;
    if pod_hints.cpu_bound {
        debug!(pod = %pod_name, "Pod is cpu bound");
    }
    if pod_hints.memory_bound {
        debug!(pod = %pod_name, "Pod is memory bound");
    }

    let mut best: Option<&Node> = None;

    for node in nodes {
        if !matches_selector(pod, node) {
            debug!(
                pod = %pod_name,
                node = %node.name(),
                labels = ?node.metadata.labels,
                "Node does not match selector"
            );
            continue;
        }

        let node_hints = BoundHints::from_annotations(scheduler_name, &node.metadata.annotations);
        if node_hints.cpu_bound {
            debug!(node = %node.name(), "Node is cpu bound");
        }
        if node_hints.memory_bound {
            debug!(node = %node.name(), "Node is memory bound");
        }

        let Some(current) = best else {
            best = Some(node);
            continue;
        };

        let best_usage = match NodeUsage::of(current) {
            Ok(usage) => usage,
            Err(e) => {
                warn!(node = %current.name(), error = %e, "Unreadable usage on best node");
                continue;
            }
        };
        let candidate_usage = match NodeUsage::of(node) {
            Ok(usage) => usage,
            Err(e) => {
                warn!(node = %node.name(), error = %e, "Unreadable usage, skipping node");
                continue;
            }
        };

        if should_switch(pod_hints, node_hints, best_usage, candidate_usage) {
            info!(
                candidate = %node.name(),
                candidate_cpu = %node.metrics.usage.cpu,
                candidate_memory = %node.metrics.usage.memory,
                best = %current.name(),
                best_cpu = %current.metrics.usage.cpu,
                best_memory = %current.metrics.usage.memory,
                "Switching to node with lower usage"
            );
            best = Some(node);
        } else {
            debug!(
                best = %current.name(),
                candidate = %node.name(),
                "Keeping current best node"
            );
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::tests::{metrics, node, pod};

    const SCHED: &str = "sched";

    fn metered(name: &str, cpu: &str, memory: &str) -> Node {
        let mut n = node(name, "4", true);
        n.metrics = metrics(cpu, memory);
        n
    }

    fn cpu_bound() -> BoundHints {
        BoundHints {
            cpu_bound: true,
            memory_bound: false,
        }
    }

    #[test]
    fn test_single_node_returned_without_comparison() {
        // Unparseable metrics do not matter when there is nothing to compare.
        let nodes = vec![metered("only", "garbage", "garbage")];
        let best = best_node(&pod("p", &[]), BoundHints::default(), SCHED, &nodes);
        assert_eq!(best.map(Node::name), Some("only"));
    }

    #[test]
    fn test_cpu_bound_pod_prefers_lower_cpu() {
        let nodes = vec![metered("a", "100n", "100Ki"), metered("b", "50n", "200Ki")];
        let best = best_node(&pod("p", &[]), cpu_bound(), SCHED, &nodes);
        assert_eq!(best.map(Node::name), Some("b"));
    }

    #[test]
    fn test_unflagged_requires_dominance() {
        let nodes = vec![metered("a", "100n", "100Ki"), metered("b", "50n", "200Ki")];
        let best = best_node(&pod("p", &[]), BoundHints::default(), SCHED, &nodes);
        assert_eq!(best.map(Node::name), Some("a"));
    }

    #[test]
    fn test_unflagged_switches_on_dominance() {
        let nodes = vec![metered("a", "100n", "100Ki"), metered("b", "50n", "50Ki")];
        let best = best_node(&pod("p", &[]), BoundHints::default(), SCHED, &nodes);
        assert_eq!(best.map(Node::name), Some("b"));
    }

    #[test]
    fn test_memory_bound_node_annotation() {
        let a = metered("a", "50n", "300Ki");
        let mut b = metered("b", "100n", "100Ki");
        b.metadata
            .annotations
            .insert("sched/memory-bound".to_string(), "true".to_string());

        let nodes = vec![a, b];
        let best = best_node(&pod("p", &[]), BoundHints::default(), SCHED, &nodes);
        assert_eq!(best.map(Node::name), Some("b"));
    }

    #[test]
    fn test_selector_mismatch_never_scored() {
        let mut p = pod("p", &[]);
        p.spec
            .node_selector
            .insert("disk".to_string(), "ssd".to_string());

        let mut labelled = metered("labelled", "900n", "900Ki");
        labelled
            .metadata
            .labels
            .insert("disk".to_string(), "ssd".to_string());
        let unlabelled = metered("idle", "1n", "1Ki");

        let nodes = vec![unlabelled.clone(), labelled];
        let best = best_node(&p, BoundHints::default(), SCHED, &nodes);
        assert_eq!(best.map(Node::name), Some("labelled"));

        let only_unlabelled = vec![unlabelled];
        assert!(best_node(&p, BoundHints::default(), SCHED, &only_unlabelled).is_none());
    }

    #[test]
    fn test_selector_value_mismatch() {
        let mut p = pod("p", &[]);
        p.spec
            .node_selector
            .insert("zone".to_string(), "a".to_string());
        let mut n = metered("n", "1n", "1Ki");
        n.metadata
            .labels
            .insert("zone".to_string(), "b".to_string());
        assert!(!matches_selector(&p, &n));
    }

    #[test]
    fn test_unparseable_candidate_skipped() {
        let nodes = vec![metered("a", "100n", "100Ki"), metered("b", "", "")];
        let best = best_node(&pod("p", &[]), cpu_bound(), SCHED, &nodes);
        assert_eq!(best.map(Node::name), Some("a"));
    }

    #[test]
    fn test_empty_input() {
        assert!(best_node(&pod("p", &[]), BoundHints::default(), SCHED, &[]).is_none());
    }

    #[test]
    fn test_fully_bound_pod_and_node_fall_back_to_dominance() {
        let both = BoundHints {
            cpu_bound: true,
            memory_bound: true,
        };
        let best = NodeUsage {
            cpu_nanos: 100,
            memory_kib: 100,
        };
        let cheaper_cpu = NodeUsage {
            cpu_nanos: 50,
            memory_kib: 200,
        };
        assert!(!should_switch(both, both, best, cheaper_cpu));
        assert!(should_switch(both, BoundHints::default(), best, cheaper_cpu));
    }
}
