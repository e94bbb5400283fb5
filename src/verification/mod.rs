//! Verification link data
//!
//! Resume tokens and reset password links arrive through URLs the user can
//! edit. A bad field is reported to an [`ErrorReporter`] rather than failing
//! the page.

pub mod error;
pub mod reset_password;
pub mod resume_token;
pub mod schema;

pub use error::{VerificationError, VerificationResult};
pub use reset_password::ResetPasswordVerification;
pub use resume_token::{
    ResumeToken, ResumeTokenModel, pick_resume_token_info, populate_from_resume_token,
    populate_from_stringified_resume_token,
};
pub use schema::{FieldRule, Schema, Validator};

/// Sink for validation errors that must not interrupt the user
pub trait ErrorReporter: Send + Sync {
    fn capture_error(&self, error: &VerificationError);
}

/// Reporter that writes to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn capture_error(&self, error: &VerificationError) {
        log::error!("Validation error: {}", error);
    }
}
