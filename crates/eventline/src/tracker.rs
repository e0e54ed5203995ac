//! Tracker facade
//!
//! Owns the session context, the ingestion queue, the delivery scheduler and
//! the profile pool. Cloning a [`Tracker`] is cheap; every clone talks to the
//! same pipeline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use eventline_core::{
    local_tz_offset_minutes, AppLifecycleSource, DeviceInfo, Event, EventBuilder,
    ForegroundListener, Item, Properties, SdkContext, UserProfile, LAUNCH_EVENT, REGISTER_EVENT,
};
use eventline_delivery::{
    DeliveryChannel, DeliveryWorker, HttpDeliveryChannel, IngestionQueue, ProfileWorkerPool,
    SchedulerError, WorkerScheduler,
};
use eventline_storage::{load_or_create_user_id, KeyValueStore, TaskLog};
use tracing::{debug, error, info, instrument, warn};

use crate::config::TrackerConfig;
use crate::error::{Result, TrackerError};

/// Entry point for hosts
#[derive(Clone)]
pub struct Tracker {
    inner: Arc<TrackerInner>,
}

struct TrackerInner {
    config: TrackerConfig,
    context: SdkContext,
    queue: Arc<IngestionQueue>,
    scheduler: WorkerScheduler,
    profiles: ProfileWorkerPool,
    user_id: String,
    shut_down: AtomicBool,
}

impl Tracker {
    /// Start a tracker posting over HTTP
    ///
    /// Must be called inside a tokio runtime; the delivery scheduler is spawned
    /// onto it.
    pub async fn init(
        config: TrackerConfig,
        store: Arc<dyn KeyValueStore>,
        device: DeviceInfo,
    ) -> Result<Self> {
        config.validate()?;
        let channel = HttpDeliveryChannel::new(config.channel_config())?;
        Self::init_with_channel(config, store, device, Arc::new(channel)).await
    }

    /// Start a tracker over a custom channel
    pub async fn init_with_channel(
        config: TrackerConfig,
        store: Arc<dyn KeyValueStore>,
        device: DeviceInfo,
        channel: Arc<dyn DeliveryChannel>,
    ) -> Result<Self> {
        config.validate()?;

        let user_id = load_or_create_user_id(store.as_ref()).await;
        let profile = UserProfile::generated(
            user_id.clone(),
            config.token.clone(),
            device.device_uuid.clone(),
            local_tz_offset_minutes(),
        );
        let context = SdkContext::new(config.token.clone(), device, profile);

        let queue = Arc::new(IngestionQueue::new());
        let worker = DeliveryWorker::new(
            queue.clone(),
            TaskLog::new(store),
            channel.clone(),
            config.event_endpoint.clone(),
        );
        let scheduler = WorkerScheduler::spawn(worker);
        let profiles = ProfileWorkerPool::new(
            channel,
            config.profile_endpoint.clone(),
            config.profile_concurrency,
        );

        info!(
            user_id = %user_id,
            session_id = %context.session().id,
            endpoint = %config.event_endpoint,
            "Tracker initialized"
        );

        Ok(Self {
            inner: Arc::new(TrackerInner {
                config,
                context,
                queue,
                scheduler,
                profiles,
                user_id,
                shut_down: AtomicBool::new(false),
            }),
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.inner.config
    }

    /// Persistent user id
    pub fn user_id(&self) -> &str {
        &self.inner.user_id
    }

    pub fn session_id(&self) -> String {
        self.inner.context.session().id
    }

    /// Events queued but not yet admitted to the task log
    pub fn pending_events(&self) -> usize {
        self.inner.queue.len()
    }

    /// Track an event and wait for the delivery run it triggers
    ///
    /// Delivery failures are logged; the event stays in the task log and goes
    /// out with a later run.
    #[instrument(skip(self, properties))]
    pub async fn track(&self, name: &str, properties: Option<Properties>) {
        if !self.ensure_running("track") {
            return;
        }
        match EventBuilder::new(&self.inner.context).event(name, properties) {
            Ok(event) => self.submit(event).await,
            Err(e) => error!(error = %e, "Failed to build event"),
        }
    }

    /// Track a purchase of `items`
    #[instrument(skip_all, fields(items = items.len()))]
    pub async fn purchase(&self, items: Vec<Item>, properties: Option<Properties>) {
        if !self.ensure_running("purchase") {
            return;
        }
        match EventBuilder::new(&self.inner.context).purchase(items, properties) {
            Ok(event) => self.submit(event).await,
            Err(e) => error!(error = %e, "Failed to build purchase event"),
        }
    }

    /// Update the profile, then track a register event
    pub async fn register(&self, profile: UserProfile, properties: Option<Properties>) {
        self.profile_update(profile, properties.clone()).await;
        self.track(REGISTER_EVENT, properties).await;
    }

    /// Send an updated profile and wait for a profile worker to process it
    ///
    /// Missing identity fields are filled in and `properties` are merged into
    /// the profile's custom values. The result becomes the current profile.
    #[instrument(skip_all)]
    pub async fn profile_update(&self, mut profile: UserProfile, properties: Option<Properties>) {
        if !self.ensure_running("profile_update") {
            return;
        }

        profile.fill_identity(&self.inner.user_id, &self.inner.config.token);
        if let Some(properties) = properties {
            profile.merge_custom_values(properties);
        }
        self.inner.context.set_profile(profile.clone());

        match self.inner.profiles.submit(profile).await {
            Ok(summary) if summary.stopped_on_failure => {
                warn!(
                    pending = self.inner.profiles.pending(),
                    "Profile delivery failed, will retry with the next update"
                )
            }
            Ok(summary) => debug!(delivered = summary.delivered, "Profile queue drained"),
            Err(e) => error!(error = %e, "Profile worker unavailable"),
        }
    }

    /// Current profile
    pub fn get_profile(&self) -> UserProfile {
        self.inner.context.profile()
    }

    /// Start a new session and track a launch event
    pub async fn on_foreground(&self) {
        if !self.ensure_running("on_foreground") {
            return;
        }
        self.inner.context.start_session();
        self.track(LAUNCH_EVENT, None).await;
    }

    /// Subscribe this tracker to a host lifecycle source
    pub fn attach_lifecycle(&self, source: &dyn AppLifecycleSource) {
        source.subscribe(Arc::new(self.clone()));
    }

    /// Stop accepting work and wait for queued delivery runs
    pub async fn shutdown(&self) {
        if self.inner.shut_down.swap(true, Ordering::SeqCst) {
            warn!(error = %TrackerError::configuration("tracker already shut down"), "Ignoring shutdown");
            return;
        }
        self.inner.profiles.close();
        if let Err(e) = self.inner.scheduler.shutdown().await {
            error!(error = %e, "Delivery scheduler did not shut down cleanly");
        }
        info!("Tracker shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::SeqCst)
    }

    async fn submit(&self, event: Event) {
        let run = match self.inner.scheduler.submit(event) {
            Ok(receiver) => receiver,
            Err(e) => {
                error!(error = %TrackerError::from(e), "Event not accepted");
                return;
            }
        };
        match run.await.map_err(|_| SchedulerError::Dropped) {
            Ok(summary) => debug!(
                delivered = summary.delivered,
                failed = summary.failed,
                "Delivery run completed"
            ),
            Err(e) => error!(error = %TrackerError::from(e), "Delivery run not executed"),
        }
    }

    fn ensure_running(&self, operation: &str) -> bool {
        if self.is_shut_down() {
            let err = TrackerError::configuration("tracker has been shut down");
            error!(operation, error = %err, "Call ignored");
            return false;
        }
        true
    }
}

#[async_trait]
impl ForegroundListener for Tracker {
    async fn on_foreground(&self) {
        Tracker::on_foreground(self).await;
    }
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("user_id", &self.inner.user_id)
            .field("event_endpoint", &self.inner.config.event_endpoint)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
