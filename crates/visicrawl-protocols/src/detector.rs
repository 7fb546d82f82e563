//! Text detection protocol definitions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DetectionError;
use crate::types::{BoundingBox, Screenshot};

/// Core trait for text detectors used during visual grounding.
#[async_trait]
pub trait TextDetector: Send + Sync {
    /// Detect text regions on a screenshot.
    async fn detect(&self, image: &Screenshot) -> Result<Vec<TextDetection>, DetectionError>;
}

/// One detected text region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextDetection {
    pub text: String,
    pub bounds: BoundingBox,
    /// Detector confidence in `[0, 1]`.
    pub confidence: f32,
}

impl TextDetection {
    pub fn new(text: impl Into<String>, bounds: BoundingBox, confidence: f32) -> Self {
        Self {
            text: text.into(),
            bounds,
            confidence,
        }
    }
}
