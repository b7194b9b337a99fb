//! Cluster event reporting.
//!
//! Two events are published:
//! - `FailedScheduling` (Warning) when a pod fits no node
//! - `Scheduled` (Normal) after a successful binding

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};

use crate::cluster::types::{EventSource, ObjectMeta, ObjectReference};
use crate::cluster::{ApiError, ClusterApi, Event, Pod};

pub const REASON_FAILED_SCHEDULING: &str = "FailedScheduling";
pub const REASON_SCHEDULED: &str = "Scheduled";

/// Publishes events on behalf of the scheduler.
#[derive(Clone)]
pub struct EventReporter {
    api: Arc<dyn ClusterApi>,
    component: String,
}

impl EventReporter {
    pub fn new(api: Arc<dyn ClusterApi>, component: impl Into<String>) -> Self {
        Self {
            api,
            component: component.into(),
        }
    }

    pub async fn failed_scheduling(&self, pod: &Pod, message: &str) -> Result<(), ApiError> {
        let event = self.build(pod, "Warning", REASON_FAILED_SCHEDULING, message);
        self.api.create_event(&namespace_of(pod), &event).await
    }

    pub async fn scheduled(&self, pod: &Pod, node_name: &str) -> Result<(), ApiError> {
        let message = format!(
            "Successfully assigned {} to {}",
            pod.metadata.name, node_name
        );
        let event = self.build(pod, "Normal", REASON_SCHEDULED, &message);
        self.api.create_event(&namespace_of(pod), &event).await
    }

    fn build(&self, pod: &Pod, event_type: &str, reason: &str, message: &str) -> Event {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        Event {
            metadata: ObjectMeta {
                generate_name: format!("{}-", pod.metadata.name),
                namespace: namespace_of(pod),
                ..Default::default()
            },
            involved_object: ObjectReference {
                kind: "Pod".to_string(),
                name: pod.metadata.name.clone(),
                namespace: namespace_of(pod),
                uid: pod.metadata.uid.clone(),
                ..Default::default()
            },
            reason: reason.to_string(),
            message: message.to_string(),
            source: EventSource {
                component: self.component.clone(),
            },
            first_timestamp: timestamp.clone(),
            last_timestamp: timestamp,
            count: 1,
            event_type: event_type.to_string(),
        }
    }
}

fn namespace_of(pod: &Pod) -> String {
    if pod.metadata.namespace.is_empty() {
        "default".to_string()
    } else {
        pod.metadata.namespace.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::MockCluster;

    fn test_pod() -> Pod {
        let mut pod = Pod::default();
        pod.metadata.name = "web-1".to_string();
        pod.metadata.namespace = "prod".to_string();
        pod.metadata.uid = "uid-1".to_string();
        pod
    }

    #[tokio::test]
    async fn test_scheduled_event() {
        let cluster = Arc::new(MockCluster::new());
        let reporter = EventReporter::new(cluster.clone(), "sched");

        reporter.scheduled(&test_pod(), "node-a").await.unwrap();

        let events = cluster.events();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.reason, REASON_SCHEDULED);
        assert_eq!(event.event_type, "Normal");
        assert_eq!(event.message, "Successfully assigned web-1 to node-a");
        assert_eq!(event.metadata.generate_name, "web-1-");
        assert_eq!(event.involved_object.namespace, "prod");
        assert_eq!(event.involved_object.uid, "uid-1");
        assert_eq!(event.source.component, "sched");
        assert_eq!(event.count, 1);
        assert!(event.first_timestamp.ends_with('Z'));
    }

    #[test]
    fn test_event_wire_format() {
        let cluster = Arc::new(MockCluster::new());
        let reporter = EventReporter::new(cluster, "sched");
        let event = reporter.build(&test_pod(), "Warning", REASON_FAILED_SCHEDULING, "no fit");

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Warning");
        assert_eq!(json["involvedObject"]["kind"], "Pod");
        assert_eq!(json["metadata"]["generateName"], "web-1-");
        assert_eq!(json["source"]["component"], "sched");
    }

    #[test]
    fn test_missing_namespace_defaults() {
        let mut pod = test_pod();
        pod.metadata.namespace.clear();
        assert_eq!(namespace_of(&pod), "default");
    }
}
