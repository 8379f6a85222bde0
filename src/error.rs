//! Error types for Drover
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in Drover
#[derive(Debug, Error)]
pub enum DroverError {
    /// The agent has not been configured yet
    #[error("Agent is not configured: {0}")]
    NotConfigured(String),

    /// Settings file missing, unreadable, or invalid
    #[error("Settings error: {0}")]
    Settings(String),

    /// Session could not be established or torn down
    #[error("Session error: {0}")]
    Session(String),

    /// Configure/remove failed
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A message body failed to decode for its declared kind
    #[error("Failed to decode {kind} message: {source}")]
    Decode {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    /// Self-update failed
    #[error("Update error: {0}")]
    Update(String),

    /// The run-once wait elapsed without a qualifying message
    #[error("No message arrived within {0:?}")]
    RunOnceTimeout(std::time::Duration),

    /// Shutdown was requested; distinct from every return code
    #[error("Operation canceled")]
    Canceled,

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DroverError {
    /// True when the error is the cooperative shutdown signal, not a fault
    pub fn is_canceled(&self) -> bool {
        matches!(self, DroverError::Canceled)
    }
}

/// Result type alias for Drover operations
pub type Result<T> = std::result::Result<T, DroverError>;
