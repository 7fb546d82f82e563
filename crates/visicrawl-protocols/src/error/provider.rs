//! Decision provider errors.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Timeout after {0} ms")]
    Timeout(u64),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),
}

impl ProviderError {
    /// Whether repeating the same request may succeed.
    ///
    /// Authentication failures never recover by retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Timeout(_) | ProviderError::Transport(_))
    }

    /// Short machine-readable category.
    pub fn category(&self) -> &'static str {
        match self {
            ProviderError::Timeout(_) => "timeout",
            ProviderError::Transport(_) => "transport",
            ProviderError::Authentication(_) => "authentication",
        }
    }
}
