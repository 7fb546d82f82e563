//! Event stream protocol definitions.
//!
//! The engine reports everything observers may care about through one
//! narrow, synchronous [`EventSink::emit`] call. Sinks must not block; fan-out
//! to slow consumers happens behind the sink.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::{ActionResult, CompletionReason, ScreenId};

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;

/// Receiver of crawl events. Fire-and-forget.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: CrawlEvent);
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _event: CrawlEvent) {}
}

/// Failure classes handled by recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryKind {
    ContextLoss,
    ContextLossEscalated,
    AppCrash,
    StuckLoop,
    ProviderFailure,
    InvalidResponse,
    DeviceUnreachable,
}

impl RecoveryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryKind::ContextLoss => "context_loss",
            RecoveryKind::ContextLossEscalated => "context_loss_escalated",
            RecoveryKind::AppCrash => "app_crash",
            RecoveryKind::StuckLoop => "stuck_loop",
            RecoveryKind::ProviderFailure => "provider_failure",
            RecoveryKind::InvalidResponse => "invalid_response",
            RecoveryKind::DeviceUnreachable => "device_unreachable",
        }
    }
}

impl fmt::Display for RecoveryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical crawl event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CrawlEvent {
    SessionStarted {
        session_id: String,
        target_app: String,
        goal: String,
    },
    StepStarted {
        session_id: String,
        step: u32,
    },
    DecisionSent {
        session_id: String,
        step: u32,
        request_summary: String,
    },
    DecisionReceived {
        session_id: String,
        step: u32,
        response_summary: String,
        latency_ms: u64,
    },
    ActionExecuted {
        session_id: String,
        step: u32,
        index: usize,
        result: ActionResult,
    },
    ScreenshotCaptured {
        session_id: String,
        step: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        path: Option<PathBuf>,
        duration_ms: u64,
    },
    GroundingCompleted {
        session_id: String,
        step: u32,
        duration_ms: u64,
        element_count: usize,
    },
    ScreenResolved {
        session_id: String,
        step: u32,
        screen_id: ScreenId,
        is_new: bool,
        visit_count: u32,
    },
    StepCompleted {
        session_id: String,
        step: u32,
        action_count: usize,
        duration_ms: u64,
    },
    RecoveryStarted {
        session_id: String,
        step: u32,
        kind: RecoveryKind,
    },
    RecoveryCompleted {
        session_id: String,
        step: u32,
        kind: RecoveryKind,
    },
    RecoveryExhausted {
        session_id: String,
        step: u32,
        kind: RecoveryKind,
    },
    SessionCompleted {
        session_id: String,
        total_steps: u32,
        total_duration_ms: u64,
        reason: CompletionReason,
    },
    Error {
        session_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        step: Option<u32>,
        detail: String,
    },
}

impl CrawlEvent {
    /// Stable snake_case event name.
    pub fn name(&self) -> &'static str {
        match self {
            CrawlEvent::SessionStarted { .. } => "session_started",
            CrawlEvent::StepStarted { .. } => "step_started",
            CrawlEvent::DecisionSent { .. } => "decision_sent",
            CrawlEvent::DecisionReceived { .. } => "decision_received",
            CrawlEvent::ActionExecuted { .. } => "action_executed",
            CrawlEvent::ScreenshotCaptured { .. } => "screenshot_captured",
            CrawlEvent::GroundingCompleted { .. } => "grounding_completed",
            CrawlEvent::ScreenResolved { .. } => "screen_resolved",
            CrawlEvent::StepCompleted { .. } => "step_completed",
            CrawlEvent::RecoveryStarted { .. } => "recovery_started",
            CrawlEvent::RecoveryCompleted { .. } => "recovery_completed",
            CrawlEvent::RecoveryExhausted { .. } => "recovery_exhausted",
            CrawlEvent::SessionCompleted { .. } => "session_completed",
            CrawlEvent::Error { .. } => "error",
        }
    }

    pub fn session_id(&self) -> &str {
        match self {
            CrawlEvent::SessionStarted { session_id, .. }
            | CrawlEvent::StepStarted { session_id, .. }
            | CrawlEvent::DecisionSent { session_id, .. }
            | CrawlEvent::DecisionReceived { session_id, .. }
            | CrawlEvent::ActionExecuted { session_id, .. }
            | CrawlEvent::ScreenshotCaptured { session_id, .. }
            | CrawlEvent::GroundingCompleted { session_id, .. }
            | CrawlEvent::ScreenResolved { session_id, .. }
            | CrawlEvent::StepCompleted { session_id, .. }
            | CrawlEvent::RecoveryStarted { session_id, .. }
            | CrawlEvent::RecoveryCompleted { session_id, .. }
            | CrawlEvent::RecoveryExhausted { session_id, .. }
            | CrawlEvent::SessionCompleted { session_id, .. }
            | CrawlEvent::Error { session_id, .. } => session_id,
        }
    }

    /// Step the event belongs to, if any.
    pub fn step(&self) -> Option<u32> {
        match self {
            CrawlEvent::SessionStarted { .. } | CrawlEvent::SessionCompleted { .. } => None,
            CrawlEvent::Error { step, .. } => *step,
            CrawlEvent::StepStarted { step, .. }
            | CrawlEvent::DecisionSent { step, .. }
            | CrawlEvent::DecisionReceived { step, .. }
            | CrawlEvent::ActionExecuted { step, .. }
            | CrawlEvent::ScreenshotCaptured { step, .. }
            | CrawlEvent::GroundingCompleted { step, .. }
            | CrawlEvent::ScreenResolved { step, .. }
            | CrawlEvent::StepCompleted { step, .. }
            | CrawlEvent::RecoveryStarted { step, .. }
            | CrawlEvent::RecoveryCompleted { step, .. }
            | CrawlEvent::RecoveryExhausted { step, .. } => Some(*step),
        }
    }
}
