// Log-based transport (default when no native peer is attached)

use crate::errors::TransportError;
use crate::poll::Batch;
use crate::transport::Transport;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Transport that serializes each batch to JSON and logs it
///
/// Every batch is acknowledged. Useful for running the daemon headless and
/// inspecting what would reach the native side.
#[derive(Debug)]
pub struct LogTransport {
    enabled: AtomicBool,
}

impl LogTransport {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }
}

impl Default for LogTransport {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait::async_trait]
impl Transport for LogTransport {
    async fn is_polling_permitted(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    async fn send(&self, batch: &Batch) -> Result<(), TransportError> {
        let body = serde_json::to_string(&batch.payloads)?;
        info!(
            batch_id = %batch.id,
            payloads = batch.len(),
            body = %body,
            "Outbound batch"
        );
        Ok(())
    }
}
