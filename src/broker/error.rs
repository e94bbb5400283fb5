//! Broker Error Types

use crate::channel::ChannelError;
use thiserror::Error;

/// Errors raised by broker hooks and the variant registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("Unknown broker type: {0}")]
    UnknownVariant(String),

    #[error("Unknown hook: {0}")]
    UnknownHook(String),

    #[error("Variant {variant} has no wire name for command {command}")]
    UnsupportedCommand { variant: String, command: String },

    #[error("Variant {0} has no browser channel")]
    NoChannel(String),

    #[error("Login message requires {0}")]
    MissingLoginField(&'static str),

    #[error("User canceled login")]
    UserCanceledLogin,

    #[error("Variant {variant} extends unknown parent {parent}")]
    UnknownParent { variant: String, parent: String },

    #[error("Variant inheritance cycle through {0}")]
    InheritanceCycle(String),

    #[error("Variant {0} is already registered")]
    DuplicateVariant(String),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}

impl BrokerError {
    /// Create an unsupported command error
    pub fn unsupported_command(variant: impl Into<String>, command: impl Into<String>) -> Self {
        Self::UnsupportedCommand {
            variant: variant.into(),
            command: command.into(),
        }
    }

    /// Create an unknown parent error
    pub fn unknown_parent(variant: impl Into<String>, parent: impl Into<String>) -> Self {
        Self::UnknownParent {
            variant: variant.into(),
            parent: parent.into(),
        }
    }
}

/// Result type for broker operations
pub type BrokerResult<T> = std::result::Result<T, BrokerError>;
