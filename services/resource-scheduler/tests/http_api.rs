//! Integration tests for HttpClusterApi against a fake API server.
//!
//! The server is a small axum router that serves canned nodes, metrics and
//! pods, streams watch records in arbitrary chunks, and records every POST.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, Uri};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{stream, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use resource_scheduler::cluster::{ApiError, ClusterApi, HttpClusterApi, UNSCHEDULED_SELECTOR};
use resource_scheduler::config::Config;
use resource_scheduler::{ScheduleOutcome, Scheduler};

#[derive(Clone, Default)]
struct FakeApi {
    watch_chunks: Arc<Vec<String>>,
    pod_queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
    posts: Arc<Mutex<Vec<(String, Value)>>>,
}

impl FakeApi {
    fn with_watch(chunks: &[&str]) -> Self {
        Self {
            watch_chunks: Arc::new(chunks.iter().map(|c| c.to_string()).collect()),
            ..Default::default()
        }
    }

    fn posts(&self) -> Vec<(String, Value)> {
        self.posts.lock().unwrap().clone()
    }
}

async fn nodes() -> Json<Value> {
    Json(json!({
        "kind": "NodeList",
        "items": [
            {
                "metadata": { "name": "node-a" },
                "status": {
                    "allocatable": { "cpu": "2" },
                    "conditions": [{ "type": "Ready", "status": "True" }]
                }
            },
            {
                "metadata": { "name": "node-b" },
                "status": {
                    "allocatable": { "cpu": "1" },
                    "conditions": [{ "type": "Ready", "status": "True" }]
                }
            },
            {
                "metadata": { "name": "node-c" },
                "status": {
                    "allocatable": { "cpu": "8" },
                    "conditions": [{ "type": "Ready", "status": "Unknown" }]
                }
            }
        ]
    }))
}

async fn node_metrics(Path(name): Path<String>) -> Result<Json<Value>, (StatusCode, String)> {
    let usage = match name.as_str() {
        "node-a" => json!({ "cpu": "500000000n", "memory": "2097152Ki" }),
        "node-b" => json!({ "cpu": "1000n", "memory": "1024Ki" }),
        _ => return Err((StatusCode::NOT_FOUND, format!("nodemetrics {name} not found"))),
    };
    Ok(Json(json!({ "kind": "NodeMetrics", "metadata": { "name": name }, "usage": usage })))
}

async fn pods(
    State(api): State<FakeApi>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    let unscheduled = query.get("fieldSelector").map(String::as_str) == Some(UNSCHEDULED_SELECTOR);
    api.pod_queries.lock().unwrap().push(query);

    let web = json!({
        "metadata": { "name": "web", "namespace": "prod", "uid": "uid-web" },
        "spec": {
            "schedulerName": "sched",
            "containers": [{ "name": "app", "resources": { "requests": { "cpu": "500m" } } }]
        },
        "status": { "phase": "Pending" }
    });
    let db = json!({
        "metadata": { "name": "db", "namespace": "prod" },
        "spec": {
            "nodeName": "node-a",
            "containers": [{ "name": "pg", "resources": { "requests": { "cpu": "1000m" } } }]
        },
        "status": { "phase": "Running" }
    });

    let items = if unscheduled { vec![web] } else { vec![web, db] };
    Json(json!({ "kind": "PodList", "items": items }))
}

async fn watch_pods(State(api): State<FakeApi>) -> Body {
    let chunks: Vec<Result<String, std::io::Error>> =
        api.watch_chunks.iter().cloned().map(Ok).collect();
    Body::from_stream(stream::iter(chunks))
}

async fn record_post(State(api): State<FakeApi>, uri: Uri, Json(body): Json<Value>) -> StatusCode {
    api.posts.lock().unwrap().push((uri.path().to_string(), body));
    StatusCode::CREATED
}

async fn serve(api: FakeApi) -> HttpClusterApi {
    let app = Router::new()
        .route("/api/v1/nodes", get(nodes))
        .route("/apis/metrics.k8s.io/v1beta1/nodes/{name}", get(node_metrics))
        .route("/api/v1/pods", get(pods))
        .route("/api/v1/watch/pods", get(watch_pods))
        .route("/api/v1/namespaces/{ns}/pods/{name}/binding", post(record_post))
        .route("/api/v1/namespaces/{ns}/events", post(record_post))
        .with_state(api);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await });

    let config = Config {
        api_url: format!("http://{addr}/"),
        ..Config::default()
    };
    HttpClusterApi::new(&config).unwrap()
}

#[tokio::test]
async fn test_list_nodes_and_metrics() {
    let client = serve(FakeApi::default()).await;

    let nodes = client.list_nodes().await.unwrap();
    let names: Vec<_> = nodes.iter().map(|n| n.name()).collect();
    assert_eq!(names, vec!["node-a", "node-b", "node-c"]);
    assert!(!nodes[2].is_ready());

    let metrics = client.node_metrics("node-a").await.unwrap();
    assert_eq!(metrics.usage.cpu, "500000000n");

    match client.node_metrics("node-c").await {
        Err(ApiError::Status { status, body }) => {
            assert_eq!(status, 404);
            assert!(body.contains("node-c"));
        }
        other => panic!("expected 404, got {other:?}"),
    }
}

#[tokio::test]
async fn test_list_pods_sends_field_selector() {
    let api = FakeApi::default();
    let client = serve(api.clone()).await;

    let unscheduled = client.list_pods(UNSCHEDULED_SELECTOR).await.unwrap();
    assert_eq!(unscheduled.len(), 1);
    assert!(!unscheduled[0].is_bound());

    let all = client.list_pods("").await.unwrap();
    assert_eq!(all.len(), 2);

    let queries = api.pod_queries.lock().unwrap().clone();
    assert_eq!(queries[0]["fieldSelector"], "spec.nodeName=");
    assert!(queries[1].is_empty());
}

#[tokio::test]
async fn test_watch_records_split_across_chunks() {
    let api = FakeApi::with_watch(&[
        "{\"type\":\"ADDED\",\"object\":{\"metadata\":{\"name\":\"p1\"}}}\n{\"type\":\"MOD",
        "IFIED\",\"object\":{\"metadata\":{\"name\":\"p1\"}}}\n",
        "{\"type\":\"ADDED\",\"object\":{\"metadata\":{\"name\":\"p2\"}}}",
    ]);
    let client = serve(api).await;

    let stream = client.watch_unscheduled_pods().await.unwrap();
    let events: Vec<_> = stream.map(|r| r.unwrap()).collect().await;

    let seen: Vec<_> = events
        .iter()
        .map(|e| (e.event_type.as_str(), e.object.metadata.name.as_str()))
        .collect();
    assert_eq!(
        seen,
        vec![("ADDED", "p1"), ("MODIFIED", "p1"), ("ADDED", "p2")]
    );
}

#[tokio::test]
async fn test_watch_malformed_record_ends_stream() {
    let api = FakeApi::with_watch(&[
        "{\"type\":\"ADDED\",\"object\":{\"metadata\":{\"name\":\"p1\"}}}\n",
        "<html>proxy error</html>\n",
        "{\"type\":\"ADDED\",\"object\":{\"metadata\":{\"name\":\"p2\"}}}\n",
    ]);
    let client = serve(api).await;

    let mut stream = client.watch_unscheduled_pods().await.unwrap();
    assert_eq!(stream.next().await.unwrap().unwrap().object.metadata.name, "p1");
    assert!(stream.next().await.unwrap().unwrap_err().is_decode());
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn test_watch_truncated_body_is_decode_error() {
    let api = FakeApi::with_watch(&[
        "{\"type\":\"ADDED\",\"object\":{\"metadata\":{\"name\":\"p1\"}}}\n",
        "{\"type\":\"ADDED\",\"object\":{\"meta",
    ]);
    let client = serve(api).await;

    let mut stream = client.watch_unscheduled_pods().await.unwrap();
    assert_eq!(stream.next().await.unwrap().unwrap().object.metadata.name, "p1");
    assert!(stream.next().await.unwrap().unwrap_err().is_decode());
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn test_full_pass_over_http() {
    let api = FakeApi::default();
    let client = Arc::new(serve(api.clone()).await);

    let (retry_tx, _retry_rx) = mpsc::channel(4);
    let scheduler = Scheduler::new(client.clone(), "sched", retry_tx);
    let pod = client
        .list_pods(UNSCHEDULED_SELECTOR)
        .await
        .unwrap()
        .remove(0);

    let outcome = scheduler.lock().await.schedule_pod(&pod).await.unwrap();
    assert_eq!(
        outcome,
        ScheduleOutcome::Scheduled {
            node: "node-b".to_string()
        }
    );

    let posts = api.posts();
    assert_eq!(posts.len(), 2);

    let (path, binding) = &posts[0];
    assert_eq!(path, "/api/v1/namespaces/prod/pods/web/binding");
    assert_eq!(binding["kind"], "Binding");
    assert_eq!(binding["metadata"]["name"], "web");
    assert_eq!(binding["target"]["kind"], "Node");
    assert_eq!(binding["target"]["name"], "node-b");

    let (path, event) = &posts[1];
    assert_eq!(path, "/api/v1/namespaces/prod/events");
    assert_eq!(event["reason"], "Scheduled");
    assert_eq!(event["involvedObject"]["uid"], "uid-web");
    assert_eq!(event["message"], "Successfully assigned web to node-b");
}
