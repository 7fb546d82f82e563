//! Feature hook errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HookError {
    #[error("Feature {feature} failed to start: {message}")]
    StartFailed { feature: String, message: String },

    #[error("Feature {feature} failed to stop: {message}")]
    StopFailed { feature: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
