//! KeyValueStore trait definition

use async_trait::async_trait;

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Underlying storage failed
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Write rejected by the backend
    #[error("write failed for key {key}: {reason}")]
    WriteFailed { key: String, reason: String },

    /// Key is not usable by this backend
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Value could not be encoded
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Stored value could not be decoded
    #[error("decode error: {0}")]
    Decode(String),
}

/// Host key-value storage holding string values
///
/// The delivery subsystem owns its keys exclusively; implementations only need
/// to make each individual `get`/`set` atomic.
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    /// Read a value, `None` if the key was never written
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a value, replacing any previous one
    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Delete a value; deleting a missing key is not an error
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}
