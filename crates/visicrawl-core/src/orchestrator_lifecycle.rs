//! Session lifecycle for StepOrchestrator: start, budgets, pause handling and
//! the single cleanup path.

use std::time::Duration;

use tracing::{debug, error, info, info_span, warn, Instrument};

use visicrawl_protocols::{
    CompletionReason, CrawlEvent, CrawlState, DeviceError, RecoveryKind, SessionSummary,
};

use crate::clock::PauseClock;
use crate::control::PauseKind;
use crate::error::{CrawlError, CrawlResult};
use crate::orchestrator::StepOrchestrator;

impl StepOrchestrator {
    /// Run the session until a completion reason is reached.
    ///
    /// Every ending, `unrecoverable_error` included, produces a summary.
    /// Calling `run` again on a finished orchestrator is refused.
    pub async fn run(&mut self) -> CrawlResult<SessionSummary> {
        let state = self.machine.state();
        if state != CrawlState::Uninitialized {
            return Err(CrawlError::SessionFinished(state));
        }

        self.clock = Some(PauseClock::start());
        self.set_state(CrawlState::Initializing);
        info!(
            session = %self.session.id,
            target = %self.session.target_app,
            device = self.device.id(),
            provider = self.decision.provider_id(),
            "Starting crawl session"
        );
        self.emit(CrawlEvent::SessionStarted {
            session_id: self.session.id.clone(),
            target_app: self.session.target_app.clone(),
            goal: self.session.goal.clone(),
        });

        if self.initialize().await {
            self.set_state(CrawlState::Running);
            self.run_loop().await;
        }

        Ok(self.finish().await)
    }

    async fn initialize(&mut self) -> bool {
        if let Err(e) = self.repository.create_run(&self.session).await {
            warn!("Failed to persist crawl run: {}", e);
        }

        if let Err(e) = self.decision.initialize(&self.config.decision).await {
            self.halt(0, format!("decision provider initialization failed: {}", e));
            return false;
        }

        self.features.start_all(&self.session.id, 0);

        if self.config.target.launch_on_start {
            let target = self.session.target_app.clone();
            match self.device.launch_app(&target).await {
                Ok(()) => debug!(target = %target, "Target application launched"),
                Err(DeviceError::Unreachable(detail)) => {
                    if !self.reconnect(0, &detail).await {
                        return false;
                    }
                }
                Err(e) => warn!(target = %target, "Failed to launch target application: {}", e),
            }
        }

        true
    }

    async fn run_loop(&mut self) {
        while self.should_continue() {
            if !self.checkpoint(true).await {
                break;
            }

            self.step += 1;
            let step = self.step;
            let span = info_span!("step", session = %self.session.id, step);
            self.run_step(step).instrument(span).await;
        }
    }

    /// Budget and stop check performed before every step.
    ///
    /// Records the completion reason the first time it returns `false`.
    pub(crate) fn should_continue(&mut self) -> bool {
        if self.completion.is_some() || self.machine.state() != CrawlState::Running {
            return false;
        }

        if self.receiver.is_stopped() {
            self.complete(CompletionReason::UserStopped);
            return false;
        }

        if let Some(max_steps) = self.session.budget.max_steps {
            if self.step >= max_steps {
                self.complete(CompletionReason::StepLimit);
                return false;
            }
        }

        if let (Some(max_duration), Some(clock)) = (self.session.budget.max_duration, &self.clock) {
            if clock.active_elapsed() >= max_duration {
                self.complete(CompletionReason::DurationLimit);
                return false;
            }
        }

        true
    }

    /// Wait out pauses. Returns `false` when the session was stopped.
    ///
    /// `step_boundary` is set only before a step starts; that is the only
    /// place step mode holds the loop.
    pub(crate) async fn checkpoint(&mut self, step_boundary: bool) -> bool {
        let mut paused: Option<CrawlState> = None;

        loop {
            if self.receiver.is_stopped() {
                self.leave_pause(paused);
                self.complete(CompletionReason::UserStopped);
                return false;
            }

            let wanted = match self.receiver.gate(step_boundary) {
                None => {
                    self.leave_pause(paused);
                    return true;
                }
                Some(PauseKind::Manual) => CrawlState::PausedManual,
                Some(PauseKind::Step) => CrawlState::PausedStep,
            };

            if paused != Some(wanted) {
                match paused {
                    Some(_) => {
                        self.set_state(CrawlState::Running);
                    }
                    None => {
                        if let Some(clock) = self.clock.as_mut() {
                            clock.begin_pause();
                        }
                    }
                }
                self.set_state(wanted);
                info!(state = %wanted, step = self.step, "Crawl paused");
                paused = Some(wanted);
            }

            self.receiver.changed().await;
        }
    }

    fn leave_pause(&mut self, paused: Option<CrawlState>) {
        if paused.is_none() {
            return;
        }
        self.set_state(CrawlState::Running);
        if let Some(clock) = self.clock.as_mut() {
            clock.end_pause();
        }
        info!(step = self.step, "Crawl resumed");
    }

    pub(crate) fn set_state(&mut self, to: CrawlState) -> bool {
        match self.machine.transition(to) {
            Ok(()) => {
                self.session.state = to;
                true
            }
            Err(e) => {
                error!("{}", e);
                false
            }
        }
    }

    /// Record the completion reason. The first reason wins.
    pub(crate) fn complete(&mut self, reason: CompletionReason) {
        if self.completion.is_none() {
            info!(%reason, step = self.step, "{}", reason.describe());
            self.completion = Some(reason);
        }
    }

    /// End the session with `unrecoverable_error`.
    pub(crate) fn halt(&mut self, step: u32, detail: impl Into<String>) {
        let detail = detail.into();
        error!(step, "Crawl halted: {}", detail);
        self.emit(CrawlEvent::Error {
            session_id: self.session.id.clone(),
            step: (step > 0).then_some(step),
            detail,
        });
        self.complete(CompletionReason::UnrecoverableError);
        self.set_state(CrawlState::Error);
    }

    /// Reconnect after the device stopped answering.
    ///
    /// A failed reconnect halts the session and returns `false`.
    pub(crate) async fn reconnect(&mut self, step: u32, detail: &str) -> bool {
        let verdict = self.recovery.on_device_unreachable(detail);
        self.emit(self.recovery_event(step, verdict.kind, RecoveryOutcome::Started));

        match self.device.reconnect().await {
            Ok(()) => {
                tokio::time::sleep(Duration::from_millis(self.config.recovery.reconnect_delay_ms)).await;
                info!(step, "Device reconnected");
                self.emit(self.recovery_event(step, verdict.kind, RecoveryOutcome::Completed));
                true
            }
            Err(e) => {
                let verdict = self.recovery.on_reconnect_failed(&e.to_string());
                self.emit(self.recovery_event(step, verdict.kind, RecoveryOutcome::Exhausted));
                self.halt(step, format!("device unreachable ({}), reconnect failed: {}", detail, e));
                false
            }
        }
    }

    pub(crate) fn recovery_event(&self, step: u32, kind: RecoveryKind, outcome: RecoveryOutcome) -> CrawlEvent {
        let session_id = self.session.id.clone();
        match outcome {
            RecoveryOutcome::Started => CrawlEvent::RecoveryStarted { session_id, step, kind },
            RecoveryOutcome::Completed => CrawlEvent::RecoveryCompleted { session_id, step, kind },
            RecoveryOutcome::Exhausted => CrawlEvent::RecoveryExhausted { session_id, step, kind },
        }
    }

    /// Persist the record at `index` in `history`.
    pub(crate) async fn persist_record(&self, index: usize) {
        if let Some(record) = self.history.get(index) {
            if let Err(e) = self.repository.append_step(record).await {
                warn!(step = record.step, "Failed to persist step record: {}", e);
            }
        }
    }

    /// Shared cleanup for every ending.
    async fn finish(&mut self) -> SessionSummary {
        let reason = match self.completion {
            Some(reason) => reason,
            None => {
                // Only reachable when the loop exits without a budget or stop decision.
                self.complete(CompletionReason::UserStopped);
                CompletionReason::UserStopped
            }
        };

        if self.machine.state() == CrawlState::Running {
            self.set_state(CrawlState::Stopping);
        }

        let collected = self.features.stop_all().await;
        self.artifacts.extend(collected);

        if let Some(index) = self.unpersisted.take() {
            self.persist_record(index).await;
        }

        if self.machine.state() == CrawlState::Stopping {
            self.set_state(CrawlState::Stopped);
        }

        let (wall, active, paused) = self
            .clock
            .as_ref()
            .map(|c| (c.wall_elapsed(), c.active_elapsed(), c.paused()))
            .unwrap_or_default();

        let summary = SessionSummary {
            session_id: self.session.id.clone(),
            total_steps: self.step,
            failed_steps: self.failed_steps,
            screens_discovered: self.identity.graph().len(),
            active_duration: active,
            paused_duration: paused,
            wall_duration: wall,
            reason,
            final_state: self.machine.state(),
            artifacts: self.artifacts.clone(),
        };

        if let Err(e) = self.repository.complete_run(&summary).await {
            warn!("Failed to persist session summary: {}", e);
        }

        info!(
            session = %summary.session_id,
            %reason,
            total_steps = summary.total_steps,
            failed_steps = summary.failed_steps,
            screens = summary.screens_discovered,
            active_secs = active.as_secs_f64(),
            wall_secs = wall.as_secs_f64(),
            "Crawl session finished"
        );

        self.emit(CrawlEvent::SessionCompleted {
            session_id: self.session.id.clone(),
            total_steps: self.step,
            total_duration_ms: wall.as_millis() as u64,
            reason,
        });

        summary
    }
}

/// Phase of a recovery attempt reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RecoveryOutcome {
    Started,
    Completed,
    Exhausted,
}
