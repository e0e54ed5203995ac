// Tracker errors

use eventline_core::CoreError;
use eventline_delivery::{DeliveryError, SchedulerError};
use eventline_storage::StoreError;
use thiserror::Error;

/// Result type for tracker operations
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Errors returned by the tracker
///
/// Only initialization returns these to the caller. Once running, failures are
/// logged and the affected data stays queued.
#[derive(Error, Debug)]
pub enum TrackerError {
    /// Invalid or missing configuration, or use after shutdown
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

impl TrackerError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
