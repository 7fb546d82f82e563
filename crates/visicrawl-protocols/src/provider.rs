//! Decision provider protocol definitions.
//!
//! A decision provider wraps a vision-capable model. The engine hands it a
//! text prompt plus one image and gets raw text back; parsing and validation
//! happen in the engine, never in the adapter.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::types::Screenshot;

/// Core trait for decision providers.
#[async_trait]
pub trait DecisionProvider: Send + Sync {
    /// Returns the provider ID.
    fn id(&self) -> &str;

    /// Prepare the adapter (credentials, model selection).
    async fn initialize(&self, settings: &ProviderSettings) -> Result<(), ProviderError>;

    /// Generate a raw response for a prompt and an image.
    async fn generate(&self, prompt: &str, image: &Screenshot) -> Result<Generation, ProviderError>;
}

/// Settings handed to [`DecisionProvider::initialize`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub request_timeout_ms: u64,
    /// Adapter-specific options passed through untouched.
    #[serde(default)]
    pub extra: HashMap<String, Value>,
}

/// Raw provider output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generation {
    pub text: String,
    #[serde(default)]
    pub metadata: GenerationMetadata,
}

impl Generation {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: GenerationMetadata::default(),
        }
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.metadata.latency_ms = latency_ms;
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationMetadata {
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_builder() {
        let generation = Generation::new("{}").with_latency(120);
        assert_eq!(generation.text, "{}");
        assert_eq!(generation.metadata.latency_ms, 120);
        assert!(generation.metadata.token_usage.is_none());
    }

    #[test]
    fn test_token_usage_total() {
        let usage = TokenUsage {
            input_tokens: 900,
            output_tokens: 100,
        };
        assert_eq!(usage.total(), 1000);
    }

    #[test]
    fn test_provider_settings_skip_empty_key() {
        let settings = ProviderSettings {
            model: "vision-large".to_string(),
            request_timeout_ms: 60_000,
            ..Default::default()
        };
        let json = serde_json::to_string(&settings).unwrap();
        assert!(!json.contains("api_key"));
        assert!(json.contains("vision-large"));
    }
}
