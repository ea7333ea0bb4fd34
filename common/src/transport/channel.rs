// Channel-backed transport: batches land in the native side's inbox

use crate::errors::TransportError;
use crate::poll::Batch;
use crate::transport::Transport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, instrument};

/// Transport that forwards batches into a bounded mpsc channel
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    sender: mpsc::Sender<Batch>,
    enabled: Arc<AtomicBool>,
    send_timeout: Duration,
}

impl ChannelTransport {
    /// Create a transport and the receiving end the native side reads from
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Batch>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let transport = Self {
            sender,
            enabled: Arc::new(AtomicBool::new(true)),
            send_timeout: Duration::from_secs(5),
        };
        (transport, receiver)
    }

    /// Override the default 5s send timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Set the initial bridge-enabled state
    pub fn with_enabled(self, enabled: bool) -> Self {
        self.set_enabled(enabled);
        self
    }

    /// Toggle whether pollers may be started
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Send timeout in whole milliseconds, saturating at `u64::MAX`
    fn timeout_ms(&self) -> u64 {
        u64::try_from(self.send_timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

#[async_trait::async_trait]
impl Transport for ChannelTransport {
    async fn is_polling_permitted(&self) -> bool {
        self.is_enabled()
    }

    #[instrument(skip(self, batch), fields(batch_id = %batch.id, payloads = batch.len()))]
    async fn send(&self, batch: &Batch) -> Result<(), TransportError> {
        match tokio::time::timeout(self.send_timeout, self.sender.send(batch.clone())).await {
            Ok(Ok(())) => {
                debug!("Batch forwarded to native inbox");
                Ok(())
            }
            Ok(Err(_)) => Err(TransportError::ChannelClosed),
            Err(_) => Err(TransportError::Timeout(self.timeout_ms())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poll::Payload;

    #[tokio::test]
    async fn test_send_delivers_batch() {
        let (transport, mut rx) = ChannelTransport::new(4);
        let batch = Batch::new(vec![Payload::new("motion.poll")]);

        transport.send(&batch).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.id, batch.id);
        assert_eq!(received.payloads, batch.payloads);
    }

    #[tokio::test]
    async fn test_send_after_receiver_dropped_fails() {
        let (transport, rx) = ChannelTransport::new(1);
        drop(rx);

        let result = transport.send(&Batch::new(vec![Payload::new("x")])).await;
        assert_eq!(result, Err(TransportError::ChannelClosed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_times_out_when_inbox_full() {
        let (transport, _rx) = ChannelTransport::new(1);
        let transport = transport.with_timeout(Duration::from_millis(50));

        transport
            .send(&Batch::new(vec![Payload::new("first")]))
            .await
            .unwrap();
        let result = transport.send(&Batch::new(vec![Payload::new("second")])).await;

        assert_eq!(result, Err(TransportError::Timeout(50)));
    }

    #[tokio::test]
    async fn test_timeout_ms_saturates() {
        let (transport, _rx) = ChannelTransport::new(1);
        assert_eq!(transport.timeout_ms(), 5_000);

        let transport = transport.with_timeout(Duration::MAX);
        assert_eq!(transport.timeout_ms(), u64::MAX);
    }

    #[tokio::test]
    async fn test_permission_follows_enabled_flag() {
        let (transport, _rx) = ChannelTransport::new(1);
        assert!(transport.is_polling_permitted().await);

        transport.set_enabled(false);
        assert!(!transport.is_polling_permitted().await);

        let shared = transport.clone();
        shared.set_enabled(true);
        assert!(transport.is_polling_permitted().await);
    }
}
