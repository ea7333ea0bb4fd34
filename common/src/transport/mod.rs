// Outbound transport to the native counterpart

pub mod channel;
pub mod log;

use crate::errors::TransportError;
use crate::poll::Batch;
use async_trait::async_trait;

pub use channel::ChannelTransport;
pub use log::LogTransport;

/// Transport trait consumed by the poll scheduler
#[async_trait]
pub trait Transport: Send + Sync {
    /// Whether pollers may currently be started (e.g. the bridge is enabled).
    /// Called on every `Poller::start`, so it must be cheap.
    async fn is_polling_permitted(&self) -> bool;

    /// Deliver one batch. `Ok` means the native side acknowledged it.
    /// The scheduler never calls this with an empty batch.
    async fn send(&self, batch: &Batch) -> Result<(), TransportError>;
}
