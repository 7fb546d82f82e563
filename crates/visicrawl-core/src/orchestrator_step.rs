//! One exploration step: capture, ground, resolve, decide, execute, assess.

use std::path::PathBuf;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use visicrawl_protocols::{
    ActionError, ActionKind, CompletionReason, CrawlEvent, DeviceError, Gesture, RecoveryKind,
    ScreenId, Screenshot, StepError, StepRecord,
};

use crate::decision::{DecisionOutcome, ParsedDecision};
use crate::grounding::GroundingOverlay;
use crate::journal::journal_window;
use crate::orchestrator::StepOrchestrator;
use crate::orchestrator_lifecycle::RecoveryOutcome;
use crate::prompt::DecisionRequest;
use crate::recovery::{Remedy, Verdict};

/// How far a step got.
enum StepFlow {
    /// The step ran through decision (and execution, if any).
    Finished { goal_completed: bool },
    /// Capture failed, the device was lost or a stop arrived mid-step.
    Interrupted,
}

impl StepOrchestrator {
    pub(crate) async fn run_step(&mut self, step: u32) {
        let started = Instant::now();
        let mut record = StepRecord::new(&self.session.id, step);
        self.recovery.begin_step();
        self.emit(CrawlEvent::StepStarted {
            session_id: self.session.id.clone(),
            step,
        });

        let goal_completed = match self.explore(step, &mut record).await {
            StepFlow::Finished { goal_completed } => {
                self.assess_after_step(step, &record).await;
                goal_completed
            }
            StepFlow::Interrupted => false,
        };

        record.duration_ms = started.elapsed().as_millis() as u64;
        self.finish_step(record, goal_completed).await;
    }

    async fn explore(&mut self, step: u32, record: &mut StepRecord) -> StepFlow {
        let capture_started = Instant::now();
        let screenshot = match self.device.capture_screenshot().await {
            Ok(screenshot) => screenshot,
            Err(DeviceError::Unreachable(detail)) => {
                record.error = Some(StepError::DeviceFailure {
                    message: detail.clone(),
                });
                self.reconnect(step, &detail).await;
                return StepFlow::Interrupted;
            }
            Err(e) => {
                warn!("Screen capture failed: {}", e);
                record.error = Some(StepError::CaptureFailed {
                    message: e.to_string(),
                });
                return StepFlow::Interrupted;
            }
        };
        let capture_ms = capture_started.elapsed().as_millis() as u64;

        let path = if self.config.artifacts.save_screenshots {
            self.save_artifact(format!("step_{}.png", step), &screenshot.data)
                .await
        } else {
            None
        };
        self.emit(CrawlEvent::ScreenshotCaptured {
            session_id: self.session.id.clone(),
            step,
            path,
            duration_ms: capture_ms,
        });

        if !self.checkpoint(false).await {
            return StepFlow::Interrupted;
        }

        let overlay = self.grounding.process_screenshot(&screenshot).await;
        if self.config.artifacts.save_overlays && !overlay.is_empty() {
            self.save_artifact(format!("step_{}_overlay.png", step), &overlay.image().data)
                .await;
        }
        self.emit(CrawlEvent::GroundingCompleted {
            session_id: self.session.id.clone(),
            step,
            duration_ms: overlay.duration().as_millis() as u64,
            element_count: overlay.len(),
        });

        if !self.checkpoint(false).await {
            return StepFlow::Interrupted;
        }

        record.source_screen_id = self.resolve_screen(step, &screenshot).await;

        if !self.checkpoint(false).await {
            return StepFlow::Interrupted;
        }

        let Some(decision) = self.decide(step, &overlay, record).await else {
            return StepFlow::Finished {
                goal_completed: false,
            };
        };

        if !self.checkpoint(false).await {
            return StepFlow::Interrupted;
        }

        let cancel = self.receiver.cancel_token();
        let batch = self.executor.execute(&decision.actions, &overlay, &cancel).await;
        for result in &batch.results {
            self.emit(CrawlEvent::ActionExecuted {
                session_id: self.session.id.clone(),
                step,
                index: result.index,
                result: result.clone(),
            });
        }
        record.results = batch.results.clone();

        if let Some(failed) = batch.failure() {
            let error = failed.error.clone().unwrap_or(ActionError::Gesture {
                message: "unknown failure".to_string(),
            });
            debug!(index = failed.index, "Batch stopped at failed action: {}", error);
            record.error = Some(StepError::ActionFailed {
                index: failed.index,
                error: error.clone(),
            });
            if let ActionError::DeviceUnreachable { message } = error {
                if !self.reconnect(step, &message).await {
                    return StepFlow::Interrupted;
                }
            }
        }

        if batch.stopped {
            return StepFlow::Interrupted;
        }

        StepFlow::Finished {
            goal_completed: decision.goal_completed,
        }
    }

    /// Fingerprint the capture, update visit counters and link the previous step.
    async fn resolve_screen(&mut self, step: u32, screenshot: &Screenshot) -> Option<ScreenId> {
        let label = match self.device.foreground_app().await {
            Ok(app) => app.and_then(|app| app.activity),
            Err(e) => {
                debug!("Foreground query failed, screen left unlabelled: {}", e);
                None
            }
        };

        let fingerprint = match self.identity.fingerprint(screenshot).await {
            Ok(fingerprint) => fingerprint,
            Err(e) => {
                warn!("Fingerprinting failed, screen left unresolved: {}", e);
                return None;
            }
        };

        let resolution = self.identity.resolve(fingerprint, label, &self.session.id, step);
        let screen_id = resolution.screen.id;

        let previous_navigated = self
            .history
            .last()
            .is_some_and(StepRecord::terminal_navigated);
        if self.current_screen == Some(screen_id) && !previous_navigated {
            self.streak += 1;
        } else {
            self.streak = 1;
        }
        self.current_screen = Some(screen_id);
        *self.visits.entry(screen_id).or_insert(0) += 1;

        // Any navigation clears stuck, even back onto the same screen.
        if self
            .stuck
            .as_ref()
            .is_some_and(|s| s.screen_id != screen_id || previous_navigated)
        {
            info!(screen_id, previous_navigated, "Left stuck screen");
            self.stuck = None;
            self.emit(self.recovery_event(step, RecoveryKind::StuckLoop, RecoveryOutcome::Completed));
        }

        if resolution.is_new {
            if let Err(e) = self.repository.upsert_screen(&resolution.screen).await {
                warn!(screen_id, "Failed to persist screen: {}", e);
            }
        }
        self.link_previous(screen_id).await;

        self.emit(CrawlEvent::ScreenResolved {
            session_id: self.session.id.clone(),
            step,
            screen_id,
            is_new: resolution.is_new,
            visit_count: self.streak,
        });

        Some(screen_id)
    }

    /// Give the previous record its destination and persist it.
    async fn link_previous(&mut self, to: ScreenId) {
        let Some(index) = self.unpersisted.take() else {
            return;
        };

        let edge = match self.history.get_mut(index) {
            Some(record) => {
                record.destination_screen_id = Some(to);
                record
                    .source_screen_id
                    .zip(record.results.last().map(|r| r.kind))
            }
            None => None,
        };

        if let Some((from, action)) = edge {
            if from != to && self.identity.record_transition(from, to, action) {
                if let Err(e) = self
                    .repository
                    .record_transition(&self.session.id, from, to, action)
                    .await
                {
                    warn!(from, to, "Failed to persist transition: {}", e);
                }
            }
        }

        self.persist_record(index).await;
    }

    /// Ask for the next batch, applying the provider recovery policy.
    async fn decide(
        &mut self,
        step: u32,
        overlay: &GroundingOverlay,
        record: &mut StepRecord,
    ) -> Option<ParsedDecision> {
        let request = DecisionRequest {
            step,
            goal: self.session.goal.clone(),
            target_app: self.session.target_app.clone(),
            screen_id: record.source_screen_id,
            elements: overlay.elements().to_vec(),
            journal: journal_window(&self.history),
            stuck: self.stuck.clone(),
            image: overlay.image().clone(),
        };
        self.emit(CrawlEvent::DecisionSent {
            session_id: self.session.id.clone(),
            step,
            request_summary: request.summary(),
        });

        let mut retried = false;
        loop {
            let outcome = match self.decision.decide(&request).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    let verdict = self.recovery.on_provider_error(&e);
                    if verdict.remedy == Remedy::RetryOnce {
                        self.emit(self.recovery_event(step, verdict.kind, RecoveryOutcome::Started));
                        retried = true;
                        continue;
                    }
                    self.emit(self.recovery_event(step, verdict.kind, RecoveryOutcome::Exhausted));
                    record.error = Some(StepError::ProviderFailure {
                        message: e.to_string(),
                    });
                    return None;
                }
            };

            self.emit(CrawlEvent::DecisionReceived {
                session_id: self.session.id.clone(),
                step,
                response_summary: outcome.summary(),
                latency_ms: outcome.latency_ms(),
            });
            record.decision_latency_ms = Some(outcome.latency_ms());
            if retried {
                self.emit(self.recovery_event(
                    step,
                    RecoveryKind::ProviderFailure,
                    RecoveryOutcome::Completed,
                ));
            }

            return match outcome {
                DecisionOutcome::Batch { decision, .. } => {
                    record.actions = decision.actions.clone();
                    record.reasoning = decision.reasoning.clone();
                    Some(decision)
                }
                DecisionOutcome::Invalid { raw, reason, .. } => {
                    let verdict = self.recovery.on_invalid_response(&reason);
                    self.emit(self.recovery_event(step, verdict.kind, RecoveryOutcome::Started));
                    record.error = Some(StepError::InvalidResponse { reason, raw });
                    self.emit(self.recovery_event(step, verdict.kind, RecoveryOutcome::Completed));
                    None
                }
            };
        }
    }

    /// Stuck and foreground checks after the batch.
    async fn assess_after_step(&mut self, step: u32, record: &StepRecord) {
        if let Some(screen_id) = record.source_screen_id {
            let verdict = self
                .recovery
                .assess_stuck(screen_id, self.streak, record.terminal_navigated());
            if let Some(Verdict {
                kind,
                remedy: Remedy::MarkStuck(state),
            }) = verdict
            {
                if self.stuck.is_none() {
                    warn!(screen_id, visits = state.consecutive_visits, "Exploration is stuck");
                    self.emit(self.recovery_event(step, kind, RecoveryOutcome::Started));
                }
                self.stuck = Some(state);
            }
        }

        match self.device.foreground_app().await {
            Ok(app) => {
                if let Some(verdict) = self.recovery.assess_foreground(app.as_ref()) {
                    self.apply_remedy(step, verdict).await;
                }
            }
            Err(DeviceError::Unreachable(detail)) => {
                self.reconnect(step, &detail).await;
            }
            Err(e) => warn!("Foreground check failed: {}", e),
        }
    }

    async fn apply_remedy(&mut self, step: u32, verdict: Verdict) {
        self.emit(self.recovery_event(step, verdict.kind, RecoveryOutcome::Started));

        let result = match &verdict.remedy {
            Remedy::PressBack => {
                info!(step, "Pressing back to return to the target");
                self.device
                    .execute_gesture(&Gesture::new(ActionKind::Back))
                    .await
                    .map(|_| ())
            }
            Remedy::RelaunchApp => {
                info!(step, target = %self.session.target_app, "Relaunching target application");
                self.device.launch_app(&self.session.target_app).await
            }
            other => {
                debug!(?other, "Remedy has no device action");
                Ok(())
            }
        };

        match result {
            Ok(()) => {
                tokio::time::sleep(Duration::from_millis(self.config.executor.settle_delay_ms)).await;
                self.emit(self.recovery_event(step, verdict.kind, RecoveryOutcome::Completed));
            }
            Err(DeviceError::Unreachable(detail)) => {
                self.reconnect(step, &detail).await;
            }
            Err(e) => {
                warn!(kind = %verdict.kind.as_str(), "Recovery action failed: {}", e);
                self.emit(self.recovery_event(step, verdict.kind, RecoveryOutcome::Exhausted));
            }
        }
    }

    async fn finish_step(&mut self, record: StepRecord, goal_completed: bool) {
        if record.results.is_empty() {
            self.empty_steps += 1;
        } else {
            self.empty_steps = 0;
        }
        if record.error.is_some() {
            self.failed_steps += 1;
        }

        debug!(
            actions = record.actions.len(),
            executed = record.results.len(),
            duration_ms = record.duration_ms,
            error = ?record.error,
            "Step completed"
        );
        self.emit(CrawlEvent::StepCompleted {
            session_id: self.session.id.clone(),
            step: record.step,
            action_count: record.results.len(),
            duration_ms: record.duration_ms,
        });

        // The previous record never got a destination; store it as is.
        if let Some(index) = self.unpersisted.take() {
            self.persist_record(index).await;
        }
        self.history.push(record);
        self.unpersisted = Some(self.history.len() - 1);

        let empty_limit = self.config.recovery.max_consecutive_empty_steps;
        if goal_completed {
            self.complete(CompletionReason::GoalCompleted);
        } else if empty_limit > 0 && self.empty_steps >= empty_limit {
            self.complete(CompletionReason::NoActionsAvailable);
        }
    }

    async fn save_artifact(&self, name: String, data: &[u8]) -> Option<PathBuf> {
        let dir = self.artifact_dir();
        let path = dir.join(name);

        let written: std::io::Result<()> = async {
            tokio::fs::create_dir_all(&dir).await?;
            tokio::fs::write(&path, data).await
        }
        .await;

        match written {
            Ok(()) => Some(path),
            Err(e) => {
                warn!(path = %path.display(), "Failed to write artifact: {}", e);
                None
            }
        }
    }
}
