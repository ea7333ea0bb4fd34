// Bridge daemon entry point

use anyhow::{anyhow, Context};
use common::bootstrap::{init_feature_managers, init_scheduler, init_transport};
use common::config::Settings;
use common::poll::Batch;
use common::telemetry;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("Failed to load configuration")?;

    telemetry::init_logging(
        &settings.observability.log_level,
        settings.observability.tracing_endpoint.as_deref(),
    )?;

    settings.validate().map_err(|reason| {
        error!(reason = %reason, "Invalid configuration");
        anyhow!(reason)
    })?;

    info!(
        transport = ?settings.bridge.transport,
        bridge_enabled = settings.bridge.enabled,
        "Starting device bridge"
    );

    if let Some(port) = settings.observability.metrics_port {
        telemetry::init_metrics(port)?;
    }

    let handle = init_transport(&settings);
    if let Some(inbox) = handle.inbox {
        tokio::spawn(drain_inbox(inbox));
    }

    let scheduler = init_scheduler(handle.transport)?;
    let managers = init_feature_managers(&settings, &scheduler).await?;

    info!(
        pollers = scheduler.poller_count(),
        tick_interval_ms = ?scheduler.tick_interval().map(|d| d.as_millis()),
        "Bridge running, press Ctrl+C to stop"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    info!("Received Ctrl+C signal, shutting down");

    for manager in &managers {
        manager.deactivate();
    }
    drop(managers);

    if scheduler.is_timer_running() {
        warn!("Shared timer still running after all features were torn down");
    }

    if settings.observability.tracing_endpoint.is_some() {
        telemetry::shutdown_tracer();
    }

    info!("Device bridge stopped");
    Ok(())
}

/// Stand-in for the native side when the channel transport is selected
async fn drain_inbox(mut inbox: mpsc::Receiver<Batch>) {
    while let Some(batch) = inbox.recv().await {
        match serde_json::to_string(&batch.payloads) {
            Ok(body) => info!(batch_id = %batch.id, payloads = batch.len(), body = %body, "Native inbox received batch"),
            Err(e) => warn!(batch_id = %batch.id, error = %e, "Failed to render received batch"),
        }
    }
    info!("Native inbox closed");
}
