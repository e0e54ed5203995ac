//! Serial worker scheduler
//!
//! A single tokio task owns the [`DeliveryWorker`] and executes run requests
//! one at a time in the order they arrive. Requests made while a run is active
//! wait behind it; none are dropped or coalesced.

use std::sync::Arc;

use eventline_core::Event;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::SchedulerError;
use crate::queue::IngestionQueue;
use crate::worker::{DeliveryWorker, RunSummary};

struct RunRequest {
    reply: oneshot::Sender<RunSummary>,
}

/// Scheduler lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerStatus {
    /// Accepting run requests
    Running,
    /// Shut down; pending runs have completed
    Stopped,
}

/// Handle to the scheduler task
pub struct WorkerScheduler {
    queue: Arc<IngestionQueue>,
    sender: Mutex<Option<mpsc::UnboundedSender<RunRequest>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerScheduler {
    /// Start the scheduler task; must be called inside a tokio runtime
    pub fn spawn(worker: DeliveryWorker) -> Self {
        let queue = worker.queue().clone();
        let (sender, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(Self::run_loop(worker, receiver));

        Self {
            queue,
            sender: Mutex::new(Some(sender)),
            task: Mutex::new(Some(task)),
        }
    }

    async fn run_loop(mut worker: DeliveryWorker, mut receiver: mpsc::UnboundedReceiver<RunRequest>) {
        info!(endpoint = worker.endpoint(), "Delivery scheduler started");
        // Buffered requests are still served after the sender is dropped
        while let Some(request) = receiver.recv().await {
            let summary = worker.run().await;
            if request.reply.send(summary).is_err() {
                debug!("Run requester went away before completion");
            }
        }
        info!("Delivery scheduler stopped");
    }

    /// Queue a run without waiting for it
    pub fn request_run(&self) -> Result<oneshot::Receiver<RunSummary>, SchedulerError> {
        let (reply, receiver) = oneshot::channel();
        let guard = self.sender.lock();
        let sender = guard.as_ref().ok_or(SchedulerError::Closed)?;
        sender
            .send(RunRequest { reply })
            .map_err(|_| SchedulerError::Closed)?;
        Ok(receiver)
    }

    /// Enqueue `event` and queue a run that will admit it
    ///
    /// Holds the request lock across both steps, so a concurrent `shutdown`
    /// either sees neither or has the run drain the event before stopping.
    /// A closed scheduler leaves the queue untouched.
    pub fn submit(&self, event: Event) -> Result<oneshot::Receiver<RunSummary>, SchedulerError> {
        let (reply, receiver) = oneshot::channel();
        let guard = self.sender.lock();
        let sender = guard.as_ref().ok_or(SchedulerError::Closed)?;
        self.queue.enqueue(event);
        sender
            .send(RunRequest { reply })
            .map_err(|_| SchedulerError::Closed)?;
        Ok(receiver)
    }

    /// Queue a run and wait for it to complete
    pub async fn run(&self) -> Result<RunSummary, SchedulerError> {
        let receiver = self.request_run()?;
        receiver.await.map_err(|_| SchedulerError::Dropped)
    }

    pub fn status(&self) -> SchedulerStatus {
        if self.sender.lock().is_some() {
            SchedulerStatus::Running
        } else {
            SchedulerStatus::Stopped
        }
    }

    /// Stop accepting requests and wait for queued runs to finish
    pub async fn shutdown(&self) -> Result<(), SchedulerError> {
        let sender = self.sender.lock().take();
        if sender.is_none() {
            return Err(SchedulerError::Closed);
        }
        drop(sender);

        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!(error = %e, "Delivery scheduler task failed");
                return Err(SchedulerError::Dropped);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for WorkerScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerScheduler")
            .field("status", &self.status())
            .finish()
    }
}
