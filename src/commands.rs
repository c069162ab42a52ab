//! Subcommand handlers for Syncbox.

use std::sync::Arc;

use anyhow::Context;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{error, info};

use syncbox_config::Config;
use syncbox_queue::{
    ConnectivityMonitor, EntryStore, HttpDeliveryClient, ManualConnectivity, Notifier,
    ProbeConnectivity, QueueController, SqliteEntryStore,
};

/// Open the store and wire up a controller around the given connectivity source.
async fn build_controller(
    config: &Config,
    connectivity: Arc<dyn ConnectivityMonitor>,
) -> anyhow::Result<Arc<QueueController>> {
    let store = open_store(config).await?;
    let delivery = HttpDeliveryClient::from_config(&config.delivery)
        .context("Failed to create delivery client")?;

    Ok(Arc::new(QueueController::new(
        &config.queue,
        store,
        Arc::new(delivery),
        connectivity,
        Notifier::from_config(&config.notify),
    )))
}

async fn open_store(config: &Config) -> anyhow::Result<Arc<SqliteEntryStore>> {
    let store = SqliteEntryStore::open(&config.queue.db_path)
        .await
        .with_context(|| format!("Failed to open queue at {}", config.queue.db_path.display()))?;
    Ok(Arc::new(store))
}

/// Run the controller until Ctrl+C or SIGTERM.
pub(crate) async fn run(config: Config) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = Vec::new();

    let probe = ProbeConnectivity::from_config(&config.connectivity)
        .context("Failed to create connectivity probe")?
        .map(Arc::new);

    let connectivity: Arc<dyn ConnectivityMonitor> = match probe {
        Some(probe) => {
            tasks.push(tokio::spawn(probe.clone().run(shutdown_rx.clone())));
            probe as Arc<dyn ConnectivityMonitor>
        }
        None => {
            info!("No probe URL configured, assuming online");
            Arc::new(ManualConnectivity::online())
        }
    };

    let controller = build_controller(&config, connectivity).await?;
    info!("Delivering to {}", config.delivery.url());
    tasks.push(tokio::spawn(controller.run(shutdown_rx)));

    wait_for_shutdown().await?;
    info!("Shutting down");
    let _ = shutdown_tx.send(true);

    for task in tasks {
        if let Err(e) = task.await {
            error!("Task failed during shutdown: {}", e);
        }
    }

    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown() -> anyhow::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl+C")?;
            info!("Received SIGINT");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM");
        }
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown() -> anyhow::Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    info!("Received Ctrl+C");
    Ok(())
}

/// Queue a feature without attempting delivery.
pub(crate) async fn enqueue(config: Config, feature: String) -> anyhow::Result<()> {
    let controller = build_controller(&config, Arc::new(ManualConnectivity::offline())).await?;

    match controller.enqueue(Value::String(feature)).await? {
        Some(id) => println!("Queued entry {}", id),
        None => println!("Nothing to queue"),
    }
    Ok(())
}

/// Run one drain cycle.
pub(crate) async fn drain(config: Config) -> anyhow::Result<()> {
    let probe = ProbeConnectivity::from_config(&config.connectivity)
        .context("Failed to create connectivity probe")?;

    let connectivity: Arc<dyn ConnectivityMonitor> = match probe {
        Some(probe) => {
            probe.check().await;
            Arc::new(probe) as Arc<dyn ConnectivityMonitor>
        }
        None => Arc::new(ManualConnectivity::online()),
    };

    let controller = build_controller(&config, connectivity).await?;
    let report = controller.drain().await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Print queued entries.
pub(crate) async fn list(config: Config, format: &str) -> anyhow::Result<()> {
    let store = open_store(&config).await?;
    let entries = store.get_all().await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("Queue is empty.");
        return Ok(());
    }

    println!("{:<8} {:<8} {}", "ID", "RETRIES", "PAYLOAD");
    println!("{}", "-".repeat(60));
    for entry in &entries {
        println!(
            "{:<8} {:<8} {}",
            entry.id.0,
            entry.retry_count(),
            entry.payload()
        );
    }
    Ok(())
}

/// Print queue length and delivery endpoint.
pub(crate) async fn status(config: Config) -> anyhow::Result<()> {
    let store = open_store(&config).await?;
    let count = store.count().await?;
    let unreadable = store.count_unreadable().await?;

    println!("Queue:        {}", config.queue.db_path.display());
    println!("Entries:      {}", count);
    if unreadable > 0 {
        println!(
            "Unreadable:   {} (kept in the queue, skipped by drain)",
            unreadable
        );
    }
    println!("Endpoint:     {}", config.delivery.url());
    println!("Max attempts: {}", config.queue.max_attempts);
    match config.connectivity.probe_url {
        Some(ref url) => println!("Probe:        {}", url),
        None => println!("Probe:        none (assumed online)"),
    }
    Ok(())
}
