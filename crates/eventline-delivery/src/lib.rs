// Eventline delivery
//
// Events enter through the IngestionQueue, are admitted to the persistent
// task log by the DeliveryWorker, paired with their predecessor and POSTed
// over a DeliveryChannel. The WorkerScheduler serializes worker runs.
// Profiles take a separate path through the ProfileWorkerPool.

pub mod channel;
pub mod error;
pub mod pairing;
pub mod profile;
pub mod queue;
pub mod retry;
pub mod scheduler;
pub mod worker;

pub use channel::{ChannelConfig, DeliveryChannel, DeliveryResponse, HttpDeliveryChannel, CONTENT_TYPE_JSON};
pub use error::{DeliveryError, Result, SchedulerError};
pub use pairing::prune;
pub use profile::{ProfileRunSummary, ProfileWorkerPool, DEFAULT_PROFILE_CONCURRENCY};
pub use queue::IngestionQueue;
pub use retry::{duration_millis, RetryPolicy};
pub use scheduler::{SchedulerStatus, WorkerScheduler};
pub use worker::{DeliveryWorker, RunSummary};
