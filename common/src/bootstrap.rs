// Bootstrap utilities for binary initialization

use crate::config::{Settings, TransportKind};
use crate::features::FeatureManager;
use crate::poll::{Batch, PollScheduler};
use crate::transport::{ChannelTransport, LogTransport, Transport};
use anyhow::{Context, Result};
use futures::future::try_join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

/// The configured transport plus, for the channel transport, the native inbox
pub struct TransportHandle {
    pub transport: Arc<dyn Transport>,
    pub inbox: Option<mpsc::Receiver<Batch>>,
}

/// Build the outbound transport selected in settings
#[tracing::instrument(skip(settings))]
pub fn init_transport(settings: &Settings) -> TransportHandle {
    match settings.bridge.transport {
        TransportKind::Log => {
            info!(enabled = settings.bridge.enabled, "Using log transport");
            TransportHandle {
                transport: Arc::new(LogTransport::new(settings.bridge.enabled)),
                inbox: None,
            }
        }
        TransportKind::Channel => {
            let (transport, inbox) = ChannelTransport::new(settings.bridge.channel_capacity);
            let transport = transport
                .with_timeout(Duration::from_millis(settings.bridge.send_timeout_ms))
                .with_enabled(settings.bridge.enabled);
            info!(
                capacity = settings.bridge.channel_capacity,
                send_timeout_ms = settings.bridge.send_timeout_ms,
                enabled = settings.bridge.enabled,
                "Using channel transport"
            );
            TransportHandle {
                transport: Arc::new(transport),
                inbox: Some(inbox),
            }
        }
    }
}

/// Create the process-wide poll scheduler
///
/// # Errors
/// Returns error when called outside a tokio runtime
pub fn init_scheduler(transport: Arc<dyn Transport>) -> Result<PollScheduler> {
    let scheduler = PollScheduler::new(transport).context("Failed to create poll scheduler")?;
    info!("Poll scheduler initialized");
    Ok(scheduler)
}

/// Build one manager per enabled feature, auto-starting where configured
///
/// # Errors
/// Returns error if any feature has an invalid interval
#[tracing::instrument(skip_all)]
pub async fn init_feature_managers(
    settings: &Settings,
    scheduler: &PollScheduler,
) -> Result<Vec<FeatureManager>> {
    let builds = settings
        .features
        .iter()
        .filter(|(_, config)| config.enabled)
        .map(|(kind, config)| async move {
            FeatureManager::from_config(scheduler, kind, config)
                .await
                .with_context(|| format!("Failed to initialize feature {}", kind))
        });

    let managers = try_join_all(builds).await?;

    info!(
        features = managers.len(),
        active = managers.iter().filter(|m| m.is_active()).count(),
        "Feature managers initialized"
    );
    Ok(managers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureKind;

    #[tokio::test(start_paused = true)]
    async fn test_log_transport_has_no_inbox() {
        let handle = init_transport(&Settings::default());
        assert!(handle.inbox.is_none());
        assert!(handle.transport.is_polling_permitted().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_channel_transport_respects_enabled_flag() {
        let mut settings = Settings::default();
        settings.bridge.transport = TransportKind::Channel;
        settings.bridge.enabled = false;

        let handle = init_transport(&settings);
        assert!(handle.inbox.is_some());
        assert!(!handle.transport.is_polling_permitted().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_feature_managers_skip_disabled_features() {
        let mut settings = Settings::default();
        settings.features.bluetooth.enabled = false;
        settings.features.motion.auto_start = true;

        let handle = init_transport(&settings);
        let scheduler = init_scheduler(handle.transport).unwrap();
        let managers = init_feature_managers(&settings, &scheduler).await.unwrap();

        assert_eq!(managers.len(), 3);
        assert!(managers.iter().all(|m| m.kind() != FeatureKind::Bluetooth));
        assert_eq!(scheduler.enabled_count(), 1);
        assert_eq!(
            scheduler.tick_interval(),
            Some(Duration::from_millis(settings.features.motion.interval_ms))
        );
    }
}
