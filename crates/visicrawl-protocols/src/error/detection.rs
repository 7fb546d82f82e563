//! Text detection errors.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DetectionError {
    #[error("Text detection failed: {0}")]
    Failed(String),

    #[error("Unsupported image: {0}")]
    UnsupportedImage(String),
}
