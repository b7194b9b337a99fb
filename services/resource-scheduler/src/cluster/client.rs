//! HTTP client for the Kubernetes REST API.
//!
//! Usually pointed at a local `kubectl proxy`, so no authentication is
//! configured here.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use super::types::{Binding, Event, List, Node, NodeMetrics, Pod};
use super::{ApiError, ClusterApi, WatchDecoder, WatchStream, UNSCHEDULED_SELECTOR};
use crate::config::Config;

/// Platform API client.
pub struct HttpClusterApi {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
}

impl HttpClusterApi {
    /// Create a new API client.
    ///
    /// The timeout is applied per request rather than on the client so the
    /// long-lived watch connection is not cut off.
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            request_timeout: config.request_timeout,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "GET");

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json, */*")
            .query(query)
            .timeout(self.request_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn post_json<T: serde::Serialize>(&self, path: &str, payload: &T) -> Result<(), ApiError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "POST");

        let response = self
            .client
            .post(&url)
            .json(payload)
            .timeout(self.request_timeout)
            .send()
            .await?;

        match response.status() {
            StatusCode::CREATED | StatusCode::OK | StatusCode::ACCEPTED => Ok(()),
            _ => Err(status_error(response).await),
        }
    }
}

async fn status_error(response: reqwest::Response) -> ApiError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    error!(status = %status, body = %body, "Unexpected API response");
    ApiError::Status {
        status: status.as_u16(),
        body,
    }
}

#[async_trait]
impl ClusterApi for HttpClusterApi {
    async fn list_nodes(&self) -> Result<Vec<Node>, ApiError> {
        let list: List<Node> = self.get_json("/api/v1/nodes", &[]).await?;
        Ok(list.items)
    }

    async fn node_metrics(&self, node_name: &str) -> Result<NodeMetrics, ApiError> {
        let path = format!("/apis/metrics.k8s.io/v1beta1/nodes/{node_name}");
        self.get_json(&path, &[]).await
    }

    async fn list_pods(&self, field_selector: &str) -> Result<Vec<Pod>, ApiError> {
        let mut query = Vec::new();
        if !field_selector.is_empty() {
            query.push(("fieldSelector", field_selector));
        }
        let list: List<Pod> = self.get_json("/api/v1/pods", &query).await?;
        Ok(list.items)
    }

    async fn watch_unscheduled_pods(&self) -> Result<WatchStream, ApiError> {
        let url = format!("{}/api/v1/watch/pods", self.base_url);
        debug!(url = %url, "Opening pod watch");

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json, */*")
            .query(&[("fieldSelector", UNSCHEDULED_SELECTOR)])
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(status_error(response).await);
        }

        let chunks = response.bytes_stream().boxed();
        let state = (chunks, WatchDecoder::new(), VecDeque::new(), false);

        let records = stream::unfold(state, |(mut chunks, mut decoder, mut ready, done)| async move {
            if done {
                return None;
            }
            loop {
                match ready.pop_front() {
                    Some(Ok(event)) => return Some((Ok(event), (chunks, decoder, ready, false))),
                    Some(Err(e)) => {
                        return Some((Err(ApiError::from(e)), (chunks, decoder, ready, true)))
                    }
                    None => {}
                }
                match chunks.next().await {
                    Some(Ok(chunk)) => ready.extend(decoder.push(&chunk)),
                    Some(Err(e)) => {
                        return Some((Err(ApiError::from(e)), (chunks, decoder, ready, true)))
                    }
                    None => {
                        let truncated = decoder.finish()?;
                        return Some((Err(ApiError::from(truncated)), (chunks, decoder, ready, true)));
                    }
                }
            }
        });

        Ok(Box::pin(records))
    }

    async fn create_binding(&self, binding: &Binding) -> Result<(), ApiError> {
        let path = format!(
            "/api/v1/namespaces/{}/pods/{}/binding",
            binding.metadata.namespace, binding.metadata.name
        );
        self.post_json(&path, binding).await
    }

    async fn create_event(&self, namespace: &str, event: &Event) -> Result<(), ApiError> {
        let path = format!("/api/v1/namespaces/{namespace}/events");
        self.post_json(&path, event).await
    }
}
