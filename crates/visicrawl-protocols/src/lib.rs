//! # VisiCrawl Protocols
//!
//! Core protocol definitions (traits) for the VisiCrawl exploration engine.
//! Contains only interface definitions and shared data types - no implementations.
//!
//! ## Core Traits
//!
//! - [`DeviceAdapter`] - Screen capture, gestures and foreground-app queries on the target device
//! - [`DecisionProvider`] - Vision-capable model adapter producing raw decision text
//! - [`TextDetector`] - Text detection used for visual grounding
//! - [`EventSink`] - Fire-and-forget event stream to external observers
//! - [`CrawlRepository`] - Write-only persistence contract
//! - [`FeatureHook`] - Auxiliary session features (capture, analysis) attached to the lifecycle

pub mod detector;
pub mod device;
pub mod error;
pub mod events;
pub mod hooks;
pub mod provider;
pub mod repository;
pub mod types;

// Re-export core traits
pub use detector::{TextDetection, TextDetector};
pub use device::{DeviceAdapter, ForegroundApp, Gesture, GestureOutcome};
pub use events::{CrawlEvent, EventSink, NullEventSink, RecoveryKind};
pub use hooks::{FeatureHook, FeatureKind};
pub use provider::{DecisionProvider, Generation, GenerationMetadata, ProviderSettings, TokenUsage};
pub use repository::CrawlRepository;
pub use error::{DetectionError, DeviceError, HookError, ProviderError, RepositoryError};
pub use types::*;
