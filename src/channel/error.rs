//! Channel Error Types

use thiserror::Error;

/// Errors raised while talking to the embedding browser
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Delivery failed for {command}: {reason}")]
    DeliveryFailed { command: String, reason: String },

    #[error("Target window closed")]
    WindowClosed,

    #[error("No response to {command} within {duration_ms}ms")]
    Timeout { command: String, duration_ms: u64 },

    #[error("Browser reported an error for {command}: {message}")]
    Remote { command: String, message: String },

    #[error("Request already pending for {0}")]
    RequestPending(String),

    #[error("Channel dropped the pending request for {0}")]
    Canceled(String),

    #[error("Invalid origin: {0}")]
    InvalidOrigin(String),

    #[error("Malformed message: {0}")]
    MalformedMessage(String),
}

impl ChannelError {
    /// Create a delivery failure
    pub fn delivery(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DeliveryFailed {
            command: command.into(),
            reason: reason.into(),
        }
    }

    /// Create a remote error
    pub fn remote(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            command: command.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ChannelError {
    fn from(err: serde_json::Error) -> Self {
        ChannelError::MalformedMessage(err.to_string())
    }
}

/// Result type for channel operations
pub type ChannelResult<T> = std::result::Result<T, ChannelError>;
