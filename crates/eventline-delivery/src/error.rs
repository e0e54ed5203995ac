// Delivery errors

use thiserror::Error;

/// Result type for delivery operations
pub type Result<T> = std::result::Result<T, DeliveryError>;

/// Failure of a single POST, or of all attempts at it
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// Connection could not be established or broke mid-request
    #[error("transport error: {0}")]
    Transport(String),

    /// Request did not complete in time
    #[error("request timed out after {0}ms")]
    Timeout(u64),

    /// Collector answered with a non-2xx status
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// Every attempt failed
    #[error("delivery failed after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<DeliveryError>,
    },

    /// Client could not be built or the endpoint is unusable
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Payload could not be encoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DeliveryError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Whether another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Timeout(_) | Self::Status { .. }
        )
    }
}

/// Scheduler errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// The scheduler was shut down before the request was accepted
    #[error("scheduler is closed")]
    Closed,

    /// The scheduler task stopped before answering
    #[error("scheduler task ended before the run completed")]
    Dropped,
}
