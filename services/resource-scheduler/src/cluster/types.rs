//! Wire objects exchanged with the platform API.
//!
//! Only the fields the scheduler reads or writes are modelled; everything else
//! in the server's JSON is ignored on decode.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Annotation some clusters use to pick a scheduler instead of `spec.schedulerName`.
pub const SCHEDULER_NAME_ANNOTATION: &str = "scheduler.alpha.kubernetes.io/name";

/// Object metadata shared by every resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub generate_name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub annotations: HashMap<String, String>,
}

/// Generic list envelope (`PodList`, `NodeList`).
#[derive(Debug, Clone, Deserialize)]
pub struct List<T> {
    #[serde(default)]
    pub items: Vec<T>,
}

// =============================================================================
// Pods
// =============================================================================

/// A work unit awaiting (or holding) a node assignment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pod {
    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: PodSpec,

    #[serde(default)]
    pub status: PodStatus,
}

impl Pod {
    /// Returns true once the pod has been assigned to a node.
    pub fn is_bound(&self) -> bool {
        !self.spec.node_name.is_empty()
    }

    /// Returns true if the pod asks for the scheduler called `scheduler_name`.
    pub fn is_managed_by(&self, scheduler_name: &str) -> bool {
        self.spec.scheduler_name == scheduler_name
            || self
                .metadata
                .annotations
                .get(SCHEDULER_NAME_ANNOTATION)
                .is_some_and(|name| name == scheduler_name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    #[serde(default)]
    pub node_name: String,

    #[serde(default)]
    pub scheduler_name: String,

    #[serde(default)]
    pub node_selector: HashMap<String, String>,

    #[serde(default)]
    pub containers: Vec<Container>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub resources: ResourceRequirements,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequirements {
    #[serde(default)]
    pub requests: HashMap<String, String>,

    #[serde(default)]
    pub limits: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodStatus {
    #[serde(default)]
    pub phase: String,
}

/// One record of the pod watch stream.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchEvent {
    #[serde(rename = "type")]
    pub event_type: String,

    pub object: Pod,
}

impl WatchEvent {
    pub fn is_added(&self) -> bool {
        self.event_type == "ADDED"
    }
}

// =============================================================================
// Nodes
// =============================================================================

/// A cluster host.
///
/// `metrics` is not part of the node object on the wire; the snapshot reader
/// fills it in from the metrics API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub status: NodeStatus,

    #[serde(skip)]
    pub metrics: NodeMetrics,
}

impl Node {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Returns true if the `Ready` condition is explicitly `True`.
    pub fn is_ready(&self) -> bool {
        self.status
            .conditions
            .iter()
            .any(|c| c.condition_type == "Ready" && c.status == "True")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatus {
    #[serde(default)]
    pub allocatable: HashMap<String, String>,

    #[serde(default)]
    pub conditions: Vec<NodeCondition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeCondition {
    #[serde(rename = "type")]
    pub condition_type: String,

    pub status: String,
}

/// Instantaneous node usage from the metrics API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMetrics {
    #[serde(default)]
    pub usage: Usage,
}

/// Usage strings: cpu in nano-cores (`"123456n"`), memory in KiB (`"1024Ki"`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub cpu: String,

    #[serde(default)]
    pub memory: String,
}

// =============================================================================
// Bindings and events
// =============================================================================

/// Assignment of a pod to a node, posted to the pod's `binding` subresource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub target: ObjectReference,
}

impl Binding {
    pub fn new(pod: &Pod, node_name: &str) -> Self {
        Self {
            api_version: "v1".to_string(),
            kind: "Binding".to_string(),
            metadata: ObjectMeta {
                name: pod.metadata.name.clone(),
                namespace: pod.metadata.namespace.clone(),
                ..Default::default()
            },
            target: ObjectReference {
                api_version: "v1".to_string(),
                kind: "Node".to_string(),
                name: node_name.to_string(),
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,

    #[serde(default)]
    pub kind: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
}

/// Cluster-visible notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub metadata: ObjectMeta,
    pub involved_object: ObjectReference,
    pub reason: String,
    pub message: String,
    pub source: EventSource,
    pub first_timestamp: String,
    pub last_timestamp: String,
    pub count: i32,
    #[serde(rename = "type")]
    pub event_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventSource {
    pub component: String,
}
