//! Resource Scheduler
//!
//! Places pods that name this scheduler onto the fitting node with the lowest
//! live resource usage.
//!
//! ## Architecture
//!
//! - **Watch**: streams newly created unscheduled pods
//! - **Retry Workers**: drain pods deferred by burst protection
//! - **Reconciliation Sweep**: periodically lists every unscheduled pod
//! - **Scheduler**: serialized decision pipeline shared by all of the above

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use resource_scheduler::cluster::HttpClusterApi;
use resource_scheduler::config::Config;
use resource_scheduler::intake;
use resource_scheduler::Scheduler;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.as_str().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting resource scheduler");
    info!(
        scheduler_name = %config.scheduler_name,
        api_url = %config.api_url,
        reconcile_interval_secs = config.reconcile_interval.as_secs(),
        workers = config.workers,
        queue_capacity = config.queue_capacity,
        "Configuration loaded"
    );

    let api = Arc::new(HttpClusterApi::new(&config).context("Failed to build API client")?);

    let (retry_tx, retry_queue) = intake::retry_queue(config.queue_capacity);
    let scheduler = Arc::new(Scheduler::new(api, config.scheduler_name.clone(), retry_tx));

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut tasks = intake::spawn_all(&config, scheduler, retry_queue, shutdown_rx);

    wait_for_signal().await;

    // Signal shutdown to all tasks
    let _ = shutdown_tx.send(true);

    info!("Waiting for tasks to shut down...");
    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            error!(error = %e, "Intake task panicked");
        }
    }

    info!("Resource scheduler shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            error!(error = %e, "Failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            info!("Received shutdown signal");
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
    info!("Received shutdown signal");
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Received shutdown signal");
}
