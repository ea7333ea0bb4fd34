// Error handling framework

use thiserror::Error;

/// Poller and scheduler errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    #[error("Invalid poll interval {interval_ms}ms: interval must be greater than 0")]
    InvalidInterval { interval_ms: u64 },

    #[error("Poll scheduler requires a running tokio runtime")]
    NoRuntime,
}

/// Outbound delivery errors
///
/// Every variant is a delivery failure: the batch was not acknowledged by the
/// native side. These are logged by the scheduler and never propagated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Batch {0} was not acknowledged")]
    NotAcknowledged(String),

    #[error("Transport channel closed")]
    ChannelClosed,

    #[error("Transport send timed out after {0}ms")]
    Timeout(u64),

    #[error("Batch serialization failed: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Serialization(err.to_string())
    }
}
