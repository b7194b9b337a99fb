//! Configuration for the scheduler.

use std::time::Duration;

use anyhow::{Context, Result};

/// Scheduler configuration (env-driven).
#[derive(Debug, Clone)]
pub struct Config {
    /// Scheduler identity. Pods opt in via `spec.schedulerName`, and
    /// annotations are namespaced as `<scheduler_name>/<key>`.
    pub scheduler_name: String,

    /// Platform API base URL (example: http://127.0.0.1:8001 via `kubectl proxy`).
    pub api_url: String,

    /// Period of the full reconciliation sweep.
    pub reconcile_interval: Duration,

    /// Capacity of the retry queue.
    pub queue_capacity: usize,

    /// Number of retry-queue workers.
    pub workers: usize,

    /// Pause taken under the decision lock before each watch/queue decision.
    pub pacing: Duration,

    /// Delay before reconnecting a failed watch.
    pub watch_backoff: Duration,

    /// Timeout for one-shot API requests.
    pub request_timeout: Duration,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scheduler_name: "k8s-resource-scheduler".to_string(),
            api_url: "http://127.0.0.1:8001".to_string(),
            reconcile_interval: Duration::from_secs(30),
            queue_capacity: 100,
            workers: 10,
            pacing: Duration::from_secs(2),
            watch_backoff: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let scheduler_name = lookup("SCHEDULER_NAME")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.scheduler_name);

        let api_url = lookup("SCHEDULER_API_URL").unwrap_or(defaults.api_url);

        let reconcile_secs: u64 = parse_var(&lookup, "SCHEDULER_RECONCILE_INTERVAL_SECS")?
            .unwrap_or(defaults.reconcile_interval.as_secs());

        let queue_capacity: usize =
            parse_var(&lookup, "SCHEDULER_QUEUE_CAPACITY")?.unwrap_or(defaults.queue_capacity);

        let workers: usize = parse_var(&lookup, "SCHEDULER_WORKERS")?.unwrap_or(defaults.workers);

        let pacing_ms: u64 = parse_var(&lookup, "SCHEDULER_PACING_MS")?
            .unwrap_or(defaults.pacing.as_millis() as u64);

        let watch_backoff_secs: u64 = parse_var(&lookup, "SCHEDULER_WATCH_BACKOFF_SECS")?
            .unwrap_or(defaults.watch_backoff.as_secs());

        let request_timeout_secs: u64 = parse_var(&lookup, "SCHEDULER_REQUEST_TIMEOUT_SECS")?
            .unwrap_or(defaults.request_timeout.as_secs());

        let log_level = lookup("SCHEDULER_LOG_LEVEL").unwrap_or(defaults.log_level);

        Ok(Self {
            scheduler_name,
            api_url,
            reconcile_interval: Duration::from_secs(reconcile_secs.max(1)),
            queue_capacity: queue_capacity.max(1),
            workers: workers.max(1),
            pacing: Duration::from_millis(pacing_ms),
            watch_backoff: Duration::from_secs(watch_backoff_secs),
            request_timeout: Duration::from_secs(request_timeout_secs.max(1)),
            log_level,
        })
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|v| v.trim().parse::<T>())
        .transpose()
        .with_context(|| format!("{key} must be a non-negative integer."))
}
