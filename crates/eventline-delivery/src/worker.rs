//! Delivery worker
//!
//! One run loads the task log, admits everything queued since the last run,
//! pairs adjacent events, delivers what is unsent, prunes, and persists.
//! Runs must never overlap; the scheduler guarantees that by owning the
//! worker.

use std::sync::Arc;

use eventline_core::Event;
use eventline_storage::TaskLog;
use tracing::{debug, error, info, instrument, warn};

use crate::channel::DeliveryChannel;
use crate::pairing::prune;
use crate::queue::IngestionQueue;

/// Outcome of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Events read from the task log
    pub loaded: usize,
    /// Events drained from the ingestion queue
    pub admitted: usize,
    /// Admitted events dropped because they cannot be persisted
    pub rejected: usize,
    /// Successful POSTs
    pub delivered: usize,
    /// POSTs that exhausted their attempts
    pub failed: usize,
    /// Events left in the task log after pruning
    pub retained: usize,
    /// Whether every task log write succeeded
    pub persisted: bool,
}

/// Pairs and delivers events from the task log
pub struct DeliveryWorker {
    queue: Arc<IngestionQueue>,
    log: TaskLog,
    channel: Arc<dyn DeliveryChannel>,
    endpoint: String,
}

impl DeliveryWorker {
    pub fn new(
        queue: Arc<IngestionQueue>,
        log: TaskLog,
        channel: Arc<dyn DeliveryChannel>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            queue,
            log,
            channel,
            endpoint: endpoint.into(),
        }
    }

    pub fn queue(&self) -> &Arc<IngestionQueue> {
        &self.queue
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Execute one run
    ///
    /// Never fails: delivery and persistence errors are logged and the affected
    /// events stay unsent for the next run.
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub async fn run(&mut self) -> RunSummary {
        let mut events = self.log.load().await;
        let mut summary = RunSummary {
            loaded: events.len(),
            persisted: true,
            ..Default::default()
        };

        let admitted = self.queue.drain();
        summary.admitted = admitted.len();
        for mut event in admitted {
            // Would make the persisted log unreadable
            if !event.has_finite_numbers() {
                error!(event = event.event_name(), "Dropping event with a non-finite number");
                summary.rejected += 1;
                continue;
            }
            event.reset_sent();
            events.push(event);
        }

        if events.is_empty() {
            debug!("Nothing to deliver");
            return summary;
        }

        // Admitted events must survive a crash during delivery
        if summary.admitted > 0 {
            summary.persisted &= self.persist(&events).await;
        }

        if events.len() == 1 {
            if !events[0].is_sent() {
                self.deliver(&mut events[0], &mut summary).await;
            }
        } else {
            for i in 1..events.len() {
                let (head, tail) = events.split_at_mut(i);
                let prev = &mut head[i - 1];
                let cur = &mut tail[0];

                if prev.is_sent() && cur.is_sent() {
                    continue;
                }

                cur.link_previous(prev);

                if !prev.is_sent() {
                    self.deliver(prev, &mut summary).await;
                }
                if !cur.is_sent() {
                    self.deliver(cur, &mut summary).await;
                }
            }
        }

        let events = prune(events);
        summary.retained = events.len();
        summary.persisted &= self.persist(&events).await;

        info!(
            loaded = summary.loaded,
            admitted = summary.admitted,
            rejected = summary.rejected,
            delivered = summary.delivered,
            failed = summary.failed,
            retained = summary.retained,
            "Delivery run finished"
        );
        summary
    }

    async fn deliver(&self, event: &mut Event, summary: &mut RunSummary) {
        let payload = match event.payload() {
            Ok(payload) => payload,
            Err(e) => {
                error!(event = event.event_name(), error = %e, "Failed to encode event");
                summary.failed += 1;
                return;
            }
        };

        match self.channel.post(&self.endpoint, &payload).await {
            Ok(response) => {
                event.mark_sent();
                summary.delivered += 1;
                debug!(
                    event = event.event_name(),
                    previous = event.previous_event_name(),
                    status = response.status,
                    "Event delivered"
                );
            }
            Err(e) => {
                summary.failed += 1;
                warn!(event = event.event_name(), error = %e, "Event delivery failed, will retry on next run");
            }
        }
    }

    async fn persist(&self, events: &[Event]) -> bool {
        match self.log.store(events).await {
            Ok(()) => true,
            Err(e) => {
                error!(events = events.len(), error = %e, "Failed to persist task log");
                false
            }
        }
    }
}

impl std::fmt::Debug for DeliveryWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryWorker")
            .field("endpoint", &self.endpoint)
            .field("log", &self.log)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::DeliveryResponse;
    use crate::error::DeliveryError;
    use async_trait::async_trait;
    use eventline_core::{EventContext, Item, LAUNCH_EVENT};
    use eventline_storage::InMemoryKeyValueStore;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Records every POST; fails them all while `failing` is set
    #[derive(Default)]
    struct RecordingChannel {
        posts: Mutex<Vec<serde_json::Value>>,
        failing: AtomicBool,
    }

    impl RecordingChannel {
        fn names(&self) -> Vec<String> {
            self.posts
                .lock()
                .iter()
                .map(|p| p["e"].as_str().unwrap_or_default().to_string())
                .collect()
        }
    }

    #[async_trait]
    impl DeliveryChannel for RecordingChannel {
        async fn post(
            &self,
            _endpoint: &str,
            body: &serde_json::Value,
        ) -> crate::error::Result<DeliveryResponse> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(DeliveryError::Exhausted {
                    attempts: 3,
                    last: Box::new(DeliveryError::transport("connection refused")),
                });
            }
            self.posts.lock().push(body.clone());
            Ok(DeliveryResponse {
                status: 200,
                body: String::new(),
                attempts: 1,
            })
        }
    }

    struct Harness {
        store: Arc<InMemoryKeyValueStore>,
        channel: Arc<RecordingChannel>,
        worker: DeliveryWorker,
    }

    impl Harness {
        fn new() -> Self {
            let store = Arc::new(InMemoryKeyValueStore::new());
            let channel = Arc::new(RecordingChannel::default());
            let worker = DeliveryWorker::new(
                Arc::new(IngestionQueue::new()),
                TaskLog::new(store.clone()),
                channel.clone(),
                "http://collector/v1/event",
            );
            Self {
                store,
                channel,
                worker,
            }
        }

        fn log(&self) -> TaskLog {
            TaskLog::new(self.store.clone())
        }

        fn enqueue(&self, name: &str, ts: i64) {
            self.worker
                .queue()
                .enqueue(Event::new(name, ts, EventContext::default()));
        }
    }

    #[tokio::test]
    async fn test_empty_run_does_nothing() {
        let mut h = Harness::new();
        let summary = h.worker.run().await;

        assert_eq!(summary, RunSummary { persisted: true, ..Default::default() });
        assert!(h.channel.names().is_empty());
        assert_eq!(h.store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_single_event_delivered_alone() {
        let mut h = Harness::new();
        h.enqueue("click", 1);

        let summary = h.worker.run().await;
        assert_eq!(summary.delivered, 1);

        let posts = h.channel.posts.lock().clone();
        assert_eq!(posts.len(), 1);
        assert!(posts[0].get("p").is_none());

        let log = h.log().load().await;
        assert_eq!(log.len(), 1);
        assert!(log[0].is_sent());
    }

    #[tokio::test]
    async fn test_pairs_unsent_events_in_order() {
        let mut h = Harness::new();
        h.enqueue("a", 1);
        h.enqueue("b", 2);
        h.enqueue("c", 3);

        h.worker.run().await;

        let posts = h.channel.posts.lock().clone();
        assert_eq!(h.channel.names(), ["a", "b", "c"]);
        assert!(posts[0].get("p").is_none());
        assert_eq!(posts[1]["p"], "a");
        assert_eq!(posts[1]["pTs"], 1);
        assert_eq!(posts[2]["p"], "b");
        assert_eq!(posts[2]["pTs"], 2);

        let log = h.log().load().await;
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].event_name(), "c");
    }

    #[tokio::test]
    async fn test_launch_then_click() {
        let mut h = Harness::new();

        h.enqueue(LAUNCH_EVENT, 1);
        h.worker.run().await;
        h.enqueue("click", 2);
        h.worker.run().await;

        let posts = h.channel.posts.lock().clone();
        assert_eq!(h.channel.names(), [LAUNCH_EVENT, "click"]);
        assert!(posts[0].get("p").is_none());
        assert!(posts[0].get("pTs").is_none());
        assert_eq!(posts[1]["p"], LAUNCH_EVENT);

        let log = h.log().load().await;
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].event_name(), "click");
        assert!(log[0].is_sent());
    }

    #[tokio::test]
    async fn test_launch_in_middle_is_not_linked() {
        let mut h = Harness::new();
        h.enqueue("click", 1);
        h.enqueue(LAUNCH_EVENT, 2);
        h.enqueue("open", 3);

        h.worker.run().await;

        let posts = h.channel.posts.lock().clone();
        assert!(posts[1].get("p").is_none());
        assert_eq!(posts[2]["p"], LAUNCH_EVENT);
    }

    #[tokio::test]
    async fn test_sent_events_are_not_resent() {
        let mut h = Harness::new();
        h.enqueue("a", 1);
        h.worker.run().await;
        h.worker.run().await;
        h.worker.run().await;

        assert_eq!(h.channel.names(), ["a"]);
    }

    #[tokio::test]
    async fn test_failed_delivery_is_retried_next_run() {
        let mut h = Harness::new();
        h.channel.failing.store(true, Ordering::SeqCst);
        h.enqueue("a", 1);
        h.enqueue("b", 2);

        let summary = h.worker.run().await;
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.delivered, 0);

        let log = h.log().load().await;
        assert_eq!(log.len(), 2);
        assert!(log.iter().all(|e| !e.is_sent()));
        // Linkage was recorded even though delivery failed
        assert_eq!(log[1].previous_event_name(), Some("a"));

        h.channel.failing.store(false, Ordering::SeqCst);
        h.enqueue("c", 3);
        h.worker.run().await;

        assert_eq!(h.channel.names(), ["a", "b", "c"]);
        let log = h.log().load().await;
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].event_name(), "c");
    }

    #[tokio::test]
    async fn test_tail_links_across_runs() {
        let mut h = Harness::new();
        h.enqueue("a", 1);
        h.worker.run().await;
        h.enqueue("b", 2);
        h.worker.run().await;

        let posts = h.channel.posts.lock().clone();
        assert_eq!(posts[1]["p"], "a");
        assert_eq!(posts[1]["pTs"], 1);
    }

    #[tokio::test]
    async fn test_admitted_events_are_reset_to_unsent() {
        let mut h = Harness::new();
        let mut event = Event::new("a", 1, EventContext::default());
        event.mark_sent();
        h.worker.queue().enqueue(event);

        h.worker.run().await;
        assert_eq!(h.channel.names(), ["a"]);
    }

    #[tokio::test]
    async fn test_non_finite_event_does_not_poison_log() {
        let mut h = Harness::new();
        h.channel.failing.store(true, Ordering::SeqCst);
        h.enqueue("a", 1);
        h.worker.run().await;

        h.worker.queue().enqueue(
            Event::new("purchase", 2, EventContext::default())
                .with_items(vec![Item::new("sku", "Shoes", f64::NAN, 1)]),
        );
        h.enqueue("b", 3);
        let summary = h.worker.run().await;

        assert_eq!(summary.rejected, 1);
        assert!(summary.persisted);
        let names: Vec<_> = h
            .log()
            .load()
            .await
            .iter()
            .map(|e| e.event_name().to_string())
            .collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[tokio::test]
    async fn test_persist_failure_keeps_running() {
        let mut h = Harness::new();
        h.store.set_fail_writes(true);
        h.enqueue("a", 1);

        let summary = h.worker.run().await;
        assert!(!summary.persisted);
        assert_eq!(summary.delivered, 1);
        assert!(h.log().load().await.is_empty());
    }
}
