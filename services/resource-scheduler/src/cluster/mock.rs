//! In-memory cluster for testing and development.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use tracing::info;

use super::types::{Binding, Event, Node, NodeMetrics, Pod, WatchEvent};
use super::{ApiError, ClusterApi, WatchStream, UNSCHEDULED_SELECTOR};

#[derive(Default)]
struct MockState {
    nodes: Vec<Node>,
    metrics: HashMap<String, NodeMetrics>,
    pods: Vec<Pod>,
    watch_batches: Vec<Vec<Result<WatchEvent, ApiError>>>,
    bindings: Vec<Binding>,
    events: Vec<(String, Event)>,
    watch_attempts: usize,
    keep_watch_open: bool,
    fail_list_nodes: bool,
    fail_bindings: bool,
}

/// Mock cluster state store.
///
/// Bindings are recorded and reflected in the pod list, so a bound pod stops
/// showing up as unscheduled.
#[derive(Default)]
pub struct MockCluster {
    state: Mutex<MockState>,
}

impl MockCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node with its usage metrics.
    pub fn add_node(&self, node: Node, metrics: Option<NodeMetrics>) {
        let mut state = self.lock();
        if let Some(metrics) = metrics {
            state.metrics.insert(node.metadata.name.clone(), metrics);
        }
        state.nodes.push(node);
    }

    pub fn add_pod(&self, pod: Pod) {
        self.lock().pods.push(pod);
    }

    /// Queue the records returned by the next successful watch call.
    pub fn push_watch_batch(&self, batch: Vec<Result<WatchEvent, ApiError>>) {
        self.lock().watch_batches.push(batch);
    }

    /// Leave each watch open and idle after its batch instead of closing it.
    pub fn keep_watch_open(&self, open: bool) {
        self.lock().keep_watch_open = open;
    }

    pub fn fail_list_nodes(&self, fail: bool) {
        self.lock().fail_list_nodes = fail;
    }

    pub fn fail_bindings(&self, fail: bool) {
        self.lock().fail_bindings = fail;
    }

    pub fn bindings(&self) -> Vec<Binding> {
        self.lock().bindings.clone()
    }

    pub fn events(&self) -> Vec<Event> {
        self.lock().events.iter().map(|(_, e)| e.clone()).collect()
    }

    /// Events with the given reason, e.g. `FailedScheduling`.
    pub fn events_with_reason(&self, reason: &str) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.reason == reason)
            .collect()
    }

    pub fn watch_attempts(&self) -> usize {
        self.lock().watch_attempts
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ClusterApi for MockCluster {
    async fn list_nodes(&self) -> Result<Vec<Node>, ApiError> {
        let state = self.lock();
        if state.fail_list_nodes {
            return Err(ApiError::Mock("node listing unavailable".to_string()));
        }
        Ok(state.nodes.clone())
    }

    async fn node_metrics(&self, node_name: &str) -> Result<NodeMetrics, ApiError> {
        self.lock()
            .metrics
            .get(node_name)
            .cloned()
            .ok_or_else(|| ApiError::Status {
                status: 404,
                body: format!("nodemetrics {node_name} not found"),
            })
    }

    async fn list_pods(&self, field_selector: &str) -> Result<Vec<Pod>, ApiError> {
        let pods = self.lock().pods.clone();
        if field_selector == UNSCHEDULED_SELECTOR {
            return Ok(pods.into_iter().filter(|p| !p.is_bound()).collect());
        }
        Ok(pods)
    }

    async fn watch_unscheduled_pods(&self) -> Result<WatchStream, ApiError> {
        let mut state = self.lock();
        state.watch_attempts += 1;
        if state.watch_batches.is_empty() {
            return Err(ApiError::Mock("watch unavailable".to_string()));
        }
        let batch = stream::iter(state.watch_batches.remove(0));
        if state.keep_watch_open {
            return Ok(Box::pin(batch.chain(stream::pending())));
        }
        Ok(Box::pin(batch))
    }

    async fn create_binding(&self, binding: &Binding) -> Result<(), ApiError> {
        let mut state = self.lock();
        if state.fail_bindings {
            return Err(ApiError::Status {
                status: 409,
                body: "pod already bound".to_string(),
            });
        }

        info!(
            pod = %binding.metadata.name,
            node = %binding.target.name,
            "[MOCK] Binding pod"
        );
        for pod in state.pods.iter_mut() {
            if pod.metadata.name == binding.metadata.name
                && pod.metadata.namespace == binding.metadata.namespace
            {
                pod.spec.node_name = binding.target.name.clone();
                pod.status.phase = "Running".to_string();
            }
        }
        state.bindings.push(binding.clone());
        Ok(())
    }

    async fn create_event(&self, namespace: &str, event: &Event) -> Result<(), ApiError> {
        self.lock()
            .events
            .push((namespace.to_string(), event.clone()));
        Ok(())
    }
}
