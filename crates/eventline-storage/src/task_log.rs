//! Persisted task log
//!
//! The whole event list is stored under one key as base64-wrapped JSON. The
//! log is only ever written by the delivery worker, which holds it for the
//! duration of a run.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use eventline_core::Event;
use tracing::{debug, warn};

use super::store::{KeyValueStore, StoreError};

/// Storage key of the task log
pub const TASK_LOG_KEY: &str = "tasks";

/// Encode an event list for storage
///
/// Fails on NaN or infinite floats, which JSON would write as `null` and
/// which would make the whole log undecodable.
pub fn encode(events: &[Event]) -> Result<String, StoreError> {
    if let Some(event) = events.iter().find(|e| !e.has_finite_numbers()) {
        return Err(StoreError::Serialization(format!(
            "event {:?} at {} contains a non-finite number",
            event.event_name(),
            event.timestamp_millis()
        )));
    }
    let json = serde_json::to_vec(events).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(STANDARD.encode(json))
}

/// Decode a stored event list
pub fn decode(raw: &str) -> Result<Vec<Event>, StoreError> {
    let bytes = STANDARD
        .decode(raw.trim())
        .map_err(|e| StoreError::Decode(format!("invalid base64: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| StoreError::Decode(format!("invalid event list: {e}")))
}

/// Ordered list of events persisted in a [`KeyValueStore`]
#[derive(Clone)]
pub struct TaskLog {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl TaskLog {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(store, TASK_LOG_KEY)
    }

    /// Task log stored under a custom key
    pub fn with_key(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the log
    ///
    /// A missing, unreadable or corrupt log yields an empty list. The next
    /// successful `store` overwrites whatever was there.
    pub async fn load(&self) -> Vec<Event> {
        let raw = match self.store.get(&self.key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to read task log, starting empty");
                return Vec::new();
            }
        };

        match decode(&raw) {
            Ok(events) => {
                debug!(key = %self.key, events = events.len(), "Loaded task log");
                events
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "Discarding corrupt task log");
                Vec::new()
            }
        }
    }

    /// Replace the stored log with `events`
    pub async fn store(&self, events: &[Event]) -> Result<(), StoreError> {
        let encoded = encode(events)?;
        self.store.set(&self.key, encoded).await?;
        debug!(key = %self.key, events = events.len(), "Stored task log");
        Ok(())
    }
}

impl std::fmt::Debug for TaskLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskLog").field("key", &self.key).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryKeyValueStore;
    use eventline_core::EventContext;

    #[test]
    fn test_encoding_is_base64() {
        let encoded = encode(&[Event::new("click", 1, EventContext::default())]).unwrap();
        let bytes = STANDARD.decode(&encoded).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value[0]["event_name"], "click");
    }

    #[tokio::test]
    async fn test_missing_log_is_empty() {
        let log = TaskLog::new(Arc::new(InMemoryKeyValueStore::new()));
        assert!(log.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_is_reported() {
        let store = Arc::new(InMemoryKeyValueStore::new());
        store.set_fail_writes(true);
        let log = TaskLog::new(store);

        let err = log.store(&[]).await.unwrap_err();
        assert!(matches!(err, StoreError::WriteFailed { .. }));
    }
}
