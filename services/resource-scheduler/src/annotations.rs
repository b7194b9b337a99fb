//! Scheduler annotations, namespaced under the scheduler name.
//!
//! Recognized keys (`<scheduler-name>/<key>`):
//! - `cpu-bound`: prefer the node with the lowest cpu usage
//! - `memory-bound`: prefer the node with the lowest memory usage
//! - `burst-protect`: minimum seconds since the last placement (pods only)

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

pub const CPU_BOUND: &str = "cpu-bound";
pub const MEMORY_BOUND: &str = "memory-bound";
pub const BURST_PROTECT: &str = "burst-protect";

/// Bound flags read from a pod or a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoundHints {
    pub cpu_bound: bool,
    pub memory_bound: bool,
}

impl BoundHints {
    pub fn from_annotations(scheduler_name: &str, annotations: &HashMap<String, String>) -> Self {
        Self {
            cpu_bound: flag(scheduler_name, annotations, CPU_BOUND),
            memory_bound: flag(scheduler_name, annotations, MEMORY_BOUND),
        }
    }
}

/// Hints carried by a pod.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PodHints {
    pub bounds: BoundHints,

    /// Zero disables the burst guard.
    pub burst_protect: Duration,
}

impl PodHints {
    pub fn from_annotations(scheduler_name: &str, annotations: &HashMap<String, String>) -> Self {
        let burst_protect = lookup(scheduler_name, annotations, BURST_PROTECT)
            .and_then(|v| match v.trim().parse::<u64>() {
                Ok(secs) => Some(secs),
                Err(_) => {
                    debug!(value = %v, "Ignoring invalid burst-protect annotation");
                    None
                }
            })
            .unwrap_or(0);

        Self {
            bounds: BoundHints::from_annotations(scheduler_name, annotations),
            burst_protect: Duration::from_secs(burst_protect),
        }
    }
}

/// Full annotation key for `key` under `scheduler_name`.
pub fn annotation_key(scheduler_name: &str, key: &str) -> String {
    format!("{scheduler_name}/{key}")
}

fn lookup<'a>(
    scheduler_name: &str,
    annotations: &'a HashMap<String, String>,
    key: &str,
) -> Option<&'a String> {
    annotations.get(&annotation_key(scheduler_name, key))
}

fn flag(scheduler_name: &str, annotations: &HashMap<String, String>, key: &str) -> bool {
    lookup(scheduler_name, annotations, key).is_some_and(|v| v.eq_ignore_ascii_case("true"))
}
