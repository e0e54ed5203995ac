//! Profile worker pool
//!
//! Profile updates share one queue. Each update spawns a worker, at most
//! `max_concurrency` at a time, which delivers queued profiles front to back
//! until the queue is empty or a delivery fails.

use std::collections::VecDeque;
use std::sync::Arc;

use eventline_core::UserProfile;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tracing::{debug, instrument, warn};

use crate::channel::DeliveryChannel;
use crate::error::SchedulerError;

/// Default number of concurrent profile workers
pub const DEFAULT_PROFILE_CONCURRENCY: usize = 5;

/// Outcome of one profile worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileRunSummary {
    pub delivered: usize,
    /// A delivery failed and the worker stopped early
    pub stopped_on_failure: bool,
}

/// Bounded pool delivering queued profiles
#[derive(Clone)]
pub struct ProfileWorkerPool {
    queue: Arc<Mutex<VecDeque<UserProfile>>>,
    permits: Arc<Semaphore>,
    channel: Arc<dyn DeliveryChannel>,
    endpoint: Arc<str>,
}

impl ProfileWorkerPool {
    pub fn new(
        channel: Arc<dyn DeliveryChannel>,
        endpoint: impl Into<String>,
        max_concurrency: usize,
    ) -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            permits: Arc::new(Semaphore::new(max_concurrency.max(1))),
            channel,
            endpoint: endpoint.into().into(),
        }
    }

    /// Profiles waiting for delivery
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Queue a profile and wait for a worker to process the queue
    #[instrument(skip(self, profile))]
    pub async fn submit(&self, profile: UserProfile) -> Result<ProfileRunSummary, SchedulerError> {
        if self.permits.is_closed() {
            return Err(SchedulerError::Closed);
        }
        self.queue.lock().push_back(profile);

        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| SchedulerError::Closed)?;

        let pool = self.clone();
        let handle = tokio::spawn(async move {
            let summary = pool.drain().await;
            drop(permit);
            summary
        });

        handle.await.map_err(|e| {
            warn!(error = %e, "Profile worker failed");
            SchedulerError::Dropped
        })
    }

    /// Stop accepting submissions; queued profiles stay queued
    pub fn close(&self) {
        self.permits.close();
    }

    async fn drain(&self) -> ProfileRunSummary {
        let mut summary = ProfileRunSummary::default();

        loop {
            // Popped, so no two workers hold the same profile
            let next = self.queue.lock().pop_front();
            let Some(profile) = next else {
                break;
            };

            let result = match profile.payload() {
                Ok(payload) => self
                    .channel
                    .post(&self.endpoint, &payload)
                    .await
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };

            match result {
                Ok(_) => {
                    summary.delivered += 1;
                    debug!(user_id = profile.user_id(), "Profile delivered");
                }
                Err(e) => {
                    warn!(user_id = profile.user_id(), error = %e, "Profile delivery failed, keeping it queued");
                    self.queue.lock().push_front(profile);
                    summary.stopped_on_failure = true;
                    break;
                }
            }
        }

        summary
    }
}

impl std::fmt::Debug for ProfileWorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileWorkerPool")
            .field("endpoint", &self.endpoint)
            .field("pending", &self.pending())
            .field("available_permits", &self.permits.available_permits())
            .finish()
    }
}
