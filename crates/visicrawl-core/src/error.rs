//! Error types for the exploration engine.

use thiserror::Error;

use visicrawl_protocols::error::{DetectionError, DeviceError, ProviderError};
use visicrawl_protocols::CrawlState;

/// Errors that end or refuse a crawl session.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// Transition outside the lifecycle table.
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: CrawlState, to: CrawlState },

    /// The session already ran; a new orchestrator is needed.
    #[error("Session already finished in state {0}")]
    SessionFinished(CrawlState),

    /// Builder was missing a required collaborator.
    #[error("Missing component: {0}")]
    MissingComponent(&'static str),

    /// Configuration rejected by validation.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Grounding error: {0}")]
    Grounding(#[from] GroundingError),

    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from visual grounding.
#[derive(Debug, Error)]
pub enum GroundingError {
    #[error("Failed to decode screenshot: {0}")]
    Decode(String),

    #[error("Failed to encode overlay: {0}")]
    Encode(String),

    #[error("Failed to load font {path}: {message}")]
    Font { path: String, message: String },

    #[error(transparent)]
    Detection(#[from] DetectionError),
}

/// Errors from screen fingerprinting.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Failed to decode screenshot: {0}")]
    Decode(String),

    #[error("Fingerprint task failed: {0}")]
    Task(String),
}

pub type CrawlResult<T> = Result<T, CrawlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_display() {
        let err = CrawlError::InvalidTransition {
            from: CrawlState::Stopped,
            to: CrawlState::Running,
        };
        assert_eq!(err.to_string(), "Invalid state transition from stopped to running");
    }

    #[test]
    fn test_from_device_error() {
        let err: CrawlError = DeviceError::Unreachable("offline".to_string()).into();
        assert!(err.to_string().contains("offline"));
        assert!(matches!(err, CrawlError::Device(_)));
    }

    #[test]
    fn test_grounding_error_transparent() {
        let err: GroundingError = DetectionError::Failed("ocr crashed".to_string()).into();
        assert_eq!(err.to_string(), "Text detection failed: ocr crashed");
    }

    #[test]
    fn test_identity_error_display() {
        let err = IdentityError::Decode("not a png".to_string());
        assert!(err.to_string().contains("not a png"));
    }
}
