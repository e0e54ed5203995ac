//! In-memory FIFO of events not yet admitted to the task log

use std::collections::VecDeque;

use eventline_core::Event;
use parking_lot::Mutex;

/// Thread-safe ingestion queue
///
/// Producers push from any thread without waiting on delivery; only the
/// delivery worker drains it.
#[derive(Debug, Default)]
pub struct IngestionQueue {
    events: Mutex<VecDeque<Event>>,
}

impl IngestionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, event: Event) {
        self.events.lock().push_back(event);
    }

    /// Take every queued event, oldest first
    pub fn drain(&self) -> Vec<Event> {
        self.events.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventline_core::EventContext;
    use std::sync::Arc;

    #[test]
    fn test_drain_is_fifo_and_empties() {
        let queue = IngestionQueue::new();
        queue.enqueue(Event::new("a", 1, EventContext::default()));
        queue.enqueue(Event::new("b", 2, EventContext::default()));

        let drained = queue.drain();
        let names: Vec<_> = drained.iter().map(|e| e.event_name()).collect();
        assert_eq!(names, ["a", "b"]);
        assert!(queue.is_empty());
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn test_concurrent_producers() {
        let queue = Arc::new(IngestionQueue::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let queue = queue.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        queue.enqueue(Event::new(format!("{t}-{i}"), i, EventContext::default()));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(queue.len(), 800);
    }
}
