//! Verification Error Types

use thiserror::Error;

/// Field validation failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    #[error("Missing property: {0}")]
    MissingProperty(String),

    #[error("Invalid property: {0}")]
    InvalidProperty(String),

    #[error("Missing resume token property: {0}")]
    MissingResumeTokenProperty(String),

    #[error("Invalid resume token property: {0}")]
    InvalidResumeTokenProperty(String),

    #[error("Malformed resume token: {0}")]
    MalformedResumeToken(String),
}

impl VerificationError {
    /// The same failure, attributed to a resume token
    pub fn into_resume_token_error(self) -> Self {
        match self {
            Self::MissingProperty(key) => Self::MissingResumeTokenProperty(key),
            Self::InvalidProperty(key) => Self::InvalidResumeTokenProperty(key),
            other => other,
        }
    }
}

/// Result type for verification operations
pub type VerificationResult<T> = std::result::Result<T, VerificationError>;
