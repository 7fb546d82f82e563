//! Session, step and completion types.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ActionDescriptor, ActionError, ActionResult, ScreenId};

/// Lifecycle state of a crawl session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlState {
    Uninitialized,
    Initializing,
    Running,
    PausedManual,
    PausedStep,
    Stopping,
    Stopped,
    Error,
}

impl CrawlState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CrawlState::Stopped | CrawlState::Error)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, CrawlState::PausedManual | CrawlState::PausedStep)
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CrawlState::Uninitialized => "uninitialized",
            CrawlState::Initializing => "initializing",
            CrawlState::Running => "running",
            CrawlState::PausedManual => "paused_manual",
            CrawlState::PausedStep => "paused_step",
            CrawlState::Stopping => "stopping",
            CrawlState::Stopped => "stopped",
            CrawlState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Step and/or active-time limits. At least one should be set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlBudget {
    pub max_steps: Option<u32>,
    pub max_duration: Option<Duration>,
}

impl CrawlBudget {
    pub fn steps(max_steps: u32) -> Self {
        Self {
            max_steps: Some(max_steps),
            max_duration: None,
        }
    }

    pub fn duration(max_duration: Duration) -> Self {
        Self {
            max_steps: None,
            max_duration: Some(max_duration),
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.max_steps.is_some() || self.max_duration.is_some()
    }
}

/// One exploration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlSession {
    pub id: String,
    pub target_app: String,
    pub goal: String,
    pub started_at: DateTime<Utc>,
    pub budget: CrawlBudget,
    pub state: CrawlState,
}

impl CrawlSession {
    pub fn new(target_app: impl Into<String>, goal: impl Into<String>, budget: CrawlBudget) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            target_app: target_app.into(),
            goal: goal.into(),
            started_at: Utc::now(),
            budget,
            state: CrawlState::Uninitialized,
        }
    }
}

/// Why a session ended. Exactly one is recorded per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    StepLimit,
    DurationLimit,
    GoalCompleted,
    UserStopped,
    UnrecoverableError,
    NoActionsAvailable,
}

impl CompletionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionReason::StepLimit => "step_limit",
            CompletionReason::DurationLimit => "duration_limit",
            CompletionReason::GoalCompleted => "goal_completed",
            CompletionReason::UserStopped => "user_stopped",
            CompletionReason::UnrecoverableError => "unrecoverable_error",
            CompletionReason::NoActionsAvailable => "no_actions_available",
        }
    }

    /// Human-readable sentence for reports and logs.
    pub fn describe(&self) -> &'static str {
        match self {
            CompletionReason::StepLimit => "step budget exhausted",
            CompletionReason::DurationLimit => "duration budget exhausted",
            CompletionReason::GoalCompleted => "goal reported as completed",
            CompletionReason::UserStopped => "stopped by user",
            CompletionReason::UnrecoverableError => "unrecoverable error",
            CompletionReason::NoActionsAvailable => "no actions available",
        }
    }
}

impl fmt::Display for CompletionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error recorded against a step. Never aborts the session by itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepError {
    /// The decision response could not be validated.
    InvalidResponse { reason: String, raw: String },
    /// The decision provider failed after retries.
    ProviderFailure { message: String },
    /// An action in the batch failed and the rest were skipped.
    ActionFailed { index: usize, error: ActionError },
    /// Screen capture failed before the step could run.
    CaptureFailed { message: String },
    /// The device stopped responding.
    DeviceFailure { message: String },
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepError::InvalidResponse { reason, .. } => write!(f, "invalid response: {}", reason),
            StepError::ProviderFailure { message } => write!(f, "provider failure: {}", message),
            StepError::ActionFailed { index, error } => {
                write!(f, "action {} failed: {}", index, error)
            }
            StepError::CaptureFailed { message } => write!(f, "capture failed: {}", message),
            StepError::DeviceFailure { message } => write!(f, "device failure: {}", message),
        }
    }
}

/// One iteration of the exploration loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub session_id: String,
    /// Monotonic, from 1.
    pub step: u32,
    pub source_screen_id: Option<ScreenId>,
    /// Screen resolved at the start of the following step.
    pub destination_screen_id: Option<ScreenId>,
    pub actions: Vec<ActionDescriptor>,
    pub results: Vec<ActionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub decision_latency_ms: Option<u64>,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,
}

impl StepRecord {
    pub fn new(session_id: impl Into<String>, step: u32) -> Self {
        Self {
            session_id: session_id.into(),
            step,
            source_screen_id: None,
            destination_screen_id: None,
            actions: Vec::new(),
            results: Vec::new(),
            reasoning: None,
            decision_latency_ms: None,
            duration_ms: 0,
            started_at: Utc::now(),
            error: None,
        }
    }

    /// Number of actions that actually ran, including a terminal failure.
    pub fn executed_count(&self) -> usize {
        self.results.len()
    }

    /// Whether the batch's last produced result navigated.
    pub fn terminal_navigated(&self) -> bool {
        self.results.last().is_some_and(|r| r.navigated)
    }

    pub fn all_succeeded(&self) -> bool {
        self.error.is_none() && self.results.iter().all(|r| r.success)
    }
}

/// Final statistics for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub total_steps: u32,
    pub failed_steps: u32,
    pub screens_discovered: usize,
    pub active_duration: Duration,
    pub paused_duration: Duration,
    pub wall_duration: Duration,
    pub reason: CompletionReason,
    pub final_state: CrawlState,
    #[serde(default)]
    pub artifacts: Vec<PathBuf>,
}
