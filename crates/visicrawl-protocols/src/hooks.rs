//! Feature lifecycle hook definitions.
//!
//! Auxiliary features (traffic capture, screen recording, static analysis)
//! attach to a session through these hooks. They never influence the step
//! loop; both calls must be safe when nothing is running.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::HookError;

/// How a feature behaves across sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    /// Holds device-side state (recorders, proxies) that may outlive a crash.
    Capture,
    /// Runs alongside the session without device-side state.
    Analysis,
}

/// Core trait for feature hooks.
#[async_trait]
pub trait FeatureHook: Send + Sync {
    /// Returns the feature name.
    fn name(&self) -> &str;

    fn kind(&self) -> FeatureKind;

    /// Start the feature. Idempotent.
    async fn start(&self, session_id: &str, step: u32) -> Result<(), HookError>;

    /// Stop the feature and return its artifact, if any. Idempotent.
    async fn stop_and_collect(&self) -> Result<Option<PathBuf>, HookError>;
}
