//! Eventline
//!
//! Client-side event tracking. Events are queued without blocking, persisted
//! in a task log, linked to the event before them and POSTed one at a time by
//! a single delivery worker. Undelivered events survive restarts and go out
//! with a later run.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use eventline::{DeviceInfo, FileKeyValueStore, Tracker, TrackerConfig};
//!
//! # async fn demo() -> eventline::Result<()> {
//! let store = Arc::new(FileKeyValueStore::open("/var/lib/myapp/eventline").await?);
//! let tracker = Tracker::init(TrackerConfig::new("client-token"), store, DeviceInfo::detect()).await?;
//!
//! tracker.on_foreground().await;
//! tracker.track("click", None).await;
//! tracker.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod telemetry;
pub mod tracker;

pub use config::{TrackerConfig, DEFAULT_EVENT_ENDPOINT, DEFAULT_PROFILE_ENDPOINT};
pub use error::{Result, TrackerError};
pub use telemetry::init_tracing;
pub use tracker::Tracker;

pub use eventline_core::{
    AppLifecycleSource, DeviceInfo, Event, ForegroundListener, Item, ManualLifecycle, Properties,
    UserProfile, LAUNCH_EVENT, PURCHASE_EVENT, REGISTER_EVENT,
};
pub use eventline_delivery::{DeliveryChannel, DeliveryResponse, RetryPolicy};
pub use eventline_storage::{FileKeyValueStore, InMemoryKeyValueStore, KeyValueStore};
