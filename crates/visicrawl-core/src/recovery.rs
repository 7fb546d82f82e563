//! Failure classification and bounded remediation.
//!
//! The coordinator only classifies and prescribes; the orchestrator applies
//! the remedy against the device. Thresholds are fixed.
//!
//! | Condition | Kind | Remedy |
//! |---|---|---|
//! | foreground app is foreign | `context_loss` | [`Remedy::PressBack`] |
//! | third consecutive foreign foreground | `context_loss_escalated` | [`Remedy::RelaunchApp`] |
//! | no foreground app | `app_crash` | [`Remedy::RelaunchApp`] |
//! | same screen > 2 visits, no navigation | `stuck_loop` | [`Remedy::MarkStuck`] |
//! | provider error | `provider_failure` | [`Remedy::RetryOnce`], then [`Remedy::FailStep`] |
//! | malformed decision | `invalid_response` | [`Remedy::SkipStep`] |
//! | device unreachable | `device_unreachable` | [`Remedy::Reconnect`], then [`Remedy::Halt`] |

use std::collections::HashSet;

use tracing::{debug, warn};

use visicrawl_protocols::{ForegroundApp, ProviderError, RecoveryKind, ScreenId, StuckState};

/// Consecutive context-loss steps that escalate to a relaunch.
pub const CONTEXT_LOSS_ESCALATION: u32 = 3;

/// Visits above this count on one screen without navigation mean stuck.
pub const STUCK_VISIT_THRESHOLD: u32 = 2;

/// What the orchestrator should do about a classified failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Remedy {
    PressBack,
    RelaunchApp,
    MarkStuck(StuckState),
    RetryOnce,
    FailStep,
    SkipStep,
    Reconnect,
    /// Session moves to `Error`.
    Halt,
}

/// Classification plus remedy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub kind: RecoveryKind,
    pub remedy: Remedy,
}

impl Verdict {
    fn new(kind: RecoveryKind, remedy: Remedy) -> Self {
        Self { kind, remedy }
    }

    /// Whether the remedy ends the session.
    pub fn halts(&self) -> bool {
        self.remedy == Remedy::Halt
    }
}

/// Stateful classifier with bounded counters.
#[derive(Debug)]
pub struct RecoveryCoordinator {
    target_app: String,
    allowed_apps: HashSet<String>,
    context_loss_streak: u32,
    provider_retry_used: bool,
}

impl RecoveryCoordinator {
    pub fn new(target_app: impl Into<String>, allowed_apps: impl IntoIterator<Item = String>) -> Self {
        Self {
            target_app: target_app.into(),
            allowed_apps: allowed_apps.into_iter().collect(),
            context_loss_streak: 0,
            provider_retry_used: false,
        }
    }

    /// Reset per-step counters.
    pub fn begin_step(&mut self) {
        self.provider_retry_used = false;
    }

    pub fn context_loss_streak(&self) -> u32 {
        self.context_loss_streak
    }

    /// Classify the foreground application after a step.
    pub fn assess_foreground(&mut self, foreground: Option<&ForegroundApp>) -> Option<Verdict> {
        let Some(app) = foreground else {
            warn!(target_app = %self.target_app, "No foreground application, assuming crash");
            self.context_loss_streak = 0;
            return Some(Verdict::new(RecoveryKind::AppCrash, Remedy::RelaunchApp));
        };

        if app.app_id == self.target_app || self.allowed_apps.contains(&app.app_id) {
            self.context_loss_streak = 0;
            return None;
        }

        self.context_loss_streak += 1;
        warn!(
            foreground = %app.app_id,
            streak = self.context_loss_streak,
            "Foreground application left the target"
        );

        if self.context_loss_streak >= CONTEXT_LOSS_ESCALATION {
            self.context_loss_streak = 0;
            Some(Verdict::new(RecoveryKind::ContextLossEscalated, Remedy::RelaunchApp))
        } else {
            Some(Verdict::new(RecoveryKind::ContextLoss, Remedy::PressBack))
        }
    }

    /// Classify a repeated screen.
    ///
    /// `last_navigated` is the terminal outcome of the step's batch.
    pub fn assess_stuck(
        &self,
        screen_id: ScreenId,
        consecutive_visits: u32,
        last_navigated: bool,
    ) -> Option<Verdict> {
        if consecutive_visits > STUCK_VISIT_THRESHOLD && !last_navigated {
            debug!(screen_id, consecutive_visits, "Stuck loop detected");
            Some(Verdict::new(
                RecoveryKind::StuckLoop,
                Remedy::MarkStuck(StuckState::new(screen_id, consecutive_visits)),
            ))
        } else {
            None
        }
    }

    /// Classify a provider failure that survived the client's retries.
    pub fn on_provider_error(&mut self, error: &ProviderError) -> Verdict {
        let remedy = if self.provider_retry_used {
            Remedy::FailStep
        } else {
            self.provider_retry_used = true;
            Remedy::RetryOnce
        };
        warn!(category = error.category(), ?remedy, "Decision provider failed: {}", error);
        Verdict::new(RecoveryKind::ProviderFailure, remedy)
    }

    pub fn on_invalid_response(&self, reason: &str) -> Verdict {
        warn!(%reason, "Decision response rejected, skipping step");
        Verdict::new(RecoveryKind::InvalidResponse, Remedy::SkipStep)
    }

    pub fn on_device_unreachable(&self, detail: &str) -> Verdict {
        warn!(%detail, "Device unreachable, attempting reconnect");
        Verdict::new(RecoveryKind::DeviceUnreachable, Remedy::Reconnect)
    }

    pub fn on_reconnect_failed(&self, detail: &str) -> Verdict {
        warn!(%detail, "Reconnect failed");
        Verdict::new(RecoveryKind::DeviceUnreachable, Remedy::Halt)
    }
}
