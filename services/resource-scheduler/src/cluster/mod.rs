//! Platform API collaborator.
//!
//! The scheduler talks to the cluster state store only through the
//! [`ClusterApi`] trait:
//! - Listing nodes and fetching their usage metrics
//! - Listing and watching pods
//! - Submitting bindings and events
//!
//! [`HttpClusterApi`] speaks the Kubernetes REST API; [`MockCluster`] keeps
//! everything in memory for tests and local development.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use thiserror::Error;

mod client;
mod mock;
pub mod types;
mod watch;

pub use client::HttpClusterApi;
pub use mock::MockCluster;
pub use types::{Binding, Event, Node, NodeMetrics, Pod, WatchEvent};
pub use watch::WatchDecoder;

/// Field selector matching pods without a node assignment.
pub const UNSCHEDULED_SELECTOR: &str = "spec.nodeName=";

/// Errors returned by the platform API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Connection, timeout or body read failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with an unexpected status code.
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not the expected JSON.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Failure injected by [`MockCluster`].
    #[error("{0}")]
    Mock(String),
}

impl ApiError {
    /// Returns true for errors caused by an unusable response body.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

/// Continuous sequence of watch records. Ends when the server closes the
/// connection; a decode error is yielded once and ends the stream.
pub type WatchStream = Pin<Box<dyn Stream<Item = Result<WatchEvent, ApiError>> + Send>>;

/// Cluster state store interface.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// List every node known to the cluster.
    async fn list_nodes(&self) -> Result<Vec<Node>, ApiError>;

    /// Fetch the current usage metrics of a node.
    async fn node_metrics(&self, node_name: &str) -> Result<NodeMetrics, ApiError>;

    /// List pods matching a field selector (empty for all pods).
    async fn list_pods(&self, field_selector: &str) -> Result<Vec<Pod>, ApiError>;

    /// Open a watch on pods without a node assignment.
    async fn watch_unscheduled_pods(&self) -> Result<WatchStream, ApiError>;

    /// Bind a pod to a node.
    async fn create_binding(&self, binding: &Binding) -> Result<(), ApiError>;

    /// Record a cluster event in `namespace`.
    async fn create_event(&self, namespace: &str, event: &Event) -> Result<(), ApiError>;
}
