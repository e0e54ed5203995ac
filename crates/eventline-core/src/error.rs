// Error types for the event model

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while building events or profile payloads
#[derive(Debug, Error)]
pub enum CoreError {
    /// The context is missing something the builder needs
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An item carries a value that cannot be stored or sent
    #[error("Invalid item {id}: {reason}")]
    InvalidItem { id: String, reason: String },

    /// Payload could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        CoreError::Configuration(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = CoreError::config("user profile not initialized");
        assert_eq!(
            err.to_string(),
            "Configuration error: user profile not initialized"
        );
    }
}
