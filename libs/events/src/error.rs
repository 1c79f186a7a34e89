//! Error types for event publication.

use thiserror::Error;

/// Errors that can occur when publishing or decoding events.
#[derive(Debug, Error, Clone)]
pub enum EventError {
    /// The bus rejected the publish.
    #[error("publish failed: {0}")]
    Publish(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for EventError {
    fn from(err: serde_json::Error) -> Self {
        EventError::Serialization(err.to_string())
    }
}
