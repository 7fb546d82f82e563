//! StepOrchestrator: owns one crawl session and drives the step loop.
//!
//! The implementation is split across files:
//! - `orchestrator.rs` - struct, builder and read accessors
//! - `orchestrator_lifecycle.rs` - run, budgets, pause checkpoints, cleanup
//! - `orchestrator_step.rs` - the body of one exploration step

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use visicrawl_config::{ConfigValidator, CrawlConfig};
use visicrawl_protocols::{
    CompletionReason, CrawlBudget, CrawlEvent, CrawlRepository, CrawlSession, CrawlState,
    DecisionProvider, DeviceAdapter, EventSink, FeatureHook, NullEventSink, ScreenId, StepRecord,
    StuckState, TextDetector,
};

use crate::clock::PauseClock;
use crate::control::{ControlReceiver, CrawlControl};
use crate::decision::DecisionClient;
use crate::error::{CrawlError, CrawlResult};
use crate::executor::ActionExecutor;
use crate::grounding::VisualGroundingEngine;
use crate::hooks::FeatureManager;
use crate::identity::{ScreenGraph, ScreenIdentity};
use crate::memory_repository::MemoryRepository;
use crate::recovery::RecoveryCoordinator;
use crate::retry::RetryPolicy;
use crate::state_machine::CrawlStateMachine;

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;

/// Drives a single crawl session from start to summary.
///
/// Every piece of session state is owned here and mutated only by the loop.
/// External callers steer the session through the [`CrawlControl`] handle.
pub struct StepOrchestrator {
    pub(crate) config: CrawlConfig,
    pub(crate) session: CrawlSession,
    pub(crate) machine: CrawlStateMachine,

    pub(crate) device: Arc<dyn DeviceAdapter>,
    pub(crate) grounding: VisualGroundingEngine,
    pub(crate) decision: DecisionClient,
    pub(crate) executor: ActionExecutor,
    pub(crate) recovery: RecoveryCoordinator,
    pub(crate) identity: ScreenIdentity,
    pub(crate) repository: Arc<dyn CrawlRepository>,
    pub(crate) events: Arc<dyn EventSink>,
    pub(crate) features: FeatureManager,

    pub(crate) control: CrawlControl,
    pub(crate) receiver: ControlReceiver,
    pub(crate) clock: Option<PauseClock>,

    /// Steps started so far.
    pub(crate) step: u32,
    pub(crate) history: Vec<StepRecord>,
    /// Index in `history` of the record still waiting for its destination.
    pub(crate) unpersisted: Option<usize>,
    pub(crate) current_screen: Option<ScreenId>,
    /// Consecutive resolutions of `current_screen` without navigation.
    pub(crate) streak: u32,
    pub(crate) visits: HashMap<ScreenId, u32>,
    pub(crate) stuck: Option<StuckState>,
    pub(crate) empty_steps: u32,
    pub(crate) failed_steps: u32,
    pub(crate) completion: Option<CompletionReason>,
    pub(crate) artifacts: Vec<PathBuf>,
}

impl StepOrchestrator {
    pub fn builder(config: CrawlConfig) -> StepOrchestratorBuilder {
        StepOrchestratorBuilder::new(config)
    }

    pub fn session(&self) -> &CrawlSession {
        &self.session
    }

    pub fn session_id(&self) -> &str {
        &self.session.id
    }

    pub fn state(&self) -> CrawlState {
        self.machine.state()
    }

    pub fn state_machine(&self) -> &CrawlStateMachine {
        &self.machine
    }

    /// Handle for pause, resume, step mode and stop.
    pub fn control(&self) -> CrawlControl {
        self.control.clone()
    }

    /// Step records in execution order.
    pub fn history(&self) -> &[StepRecord] {
        &self.history
    }

    pub fn screen_graph(&self) -> &ScreenGraph {
        self.identity.graph()
    }

    pub fn stuck(&self) -> Option<&StuckState> {
        self.stuck.as_ref()
    }

    /// Total number of times a screen was resolved.
    pub fn visit_count(&self, screen_id: ScreenId) -> u32 {
        self.visits.get(&screen_id).copied().unwrap_or(0)
    }

    pub fn completion_reason(&self) -> Option<CompletionReason> {
        self.completion
    }

    pub(crate) fn emit(&self, event: CrawlEvent) {
        self.events.emit(event);
    }

    /// Directory for this session's screenshot artifacts.
    pub(crate) fn artifact_dir(&self) -> PathBuf {
        self.config.artifacts.dir.join(&self.session.id)
    }
}

/// Builder for [`StepOrchestrator`].
pub struct StepOrchestratorBuilder {
    config: CrawlConfig,
    device: Option<Arc<dyn DeviceAdapter>>,
    provider: Option<Arc<dyn DecisionProvider>>,
    detector: Option<Arc<dyn TextDetector>>,
    repository: Option<Arc<dyn CrawlRepository>>,
    events: Option<Arc<dyn EventSink>>,
    hooks: Vec<Arc<dyn FeatureHook>>,
    control: Option<CrawlControl>,
    retry: Option<RetryPolicy>,
}

impl StepOrchestratorBuilder {
    pub fn new(config: CrawlConfig) -> Self {
        Self {
            config,
            device: None,
            provider: None,
            detector: None,
            repository: None,
            events: None,
            hooks: Vec::new(),
            control: None,
            retry: None,
        }
    }

    pub fn device(mut self, device: Arc<dyn DeviceAdapter>) -> Self {
        self.device = Some(device);
        self
    }

    pub fn provider(mut self, provider: Arc<dyn DecisionProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn detector(mut self, detector: Arc<dyn TextDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    /// Persistence backend. Defaults to a [`MemoryRepository`].
    pub fn repository(mut self, repository: Arc<dyn CrawlRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Event destination. Defaults to dropping events.
    pub fn event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn hook(mut self, hook: Arc<dyn FeatureHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Use an existing control handle instead of creating one.
    pub fn control(mut self, control: CrawlControl) -> Self {
        self.control = Some(control);
        self
    }

    /// Override the retry policy derived from `decision` config.
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn build(self) -> CrawlResult<StepOrchestrator> {
        let warnings = ConfigValidator::validate(&self.config)
            .into_result()
            .map_err(|e| CrawlError::Config(e.to_string()))?;
        for warning in warnings {
            warn!(path = %warning.path, "{}", warning.message);
        }

        let device = self.device.ok_or(CrawlError::MissingComponent("device adapter"))?;
        let provider = self.provider.ok_or(CrawlError::MissingComponent("decision provider"))?;
        let detector = self.detector.ok_or(CrawlError::MissingComponent("text detector"))?;

        let config = self.config;
        let budget = CrawlBudget {
            max_steps: config.budget.max_steps,
            max_duration: config.budget.max_duration_secs.map(Duration::from_secs),
        };
        let session = CrawlSession::new(&config.target.app_id, &config.target.goal, budget);

        let retry = self
            .retry
            .unwrap_or_else(|| RetryPolicy::from_config(&config.decision));
        let decision = DecisionClient::new(provider, retry);
        let grounding = VisualGroundingEngine::new(detector, config.grounding.clone());
        let executor = ActionExecutor::new(Arc::clone(&device), &config.executor);
        let recovery = RecoveryCoordinator::new(
            config.target.app_id.clone(),
            config.target.allowed_apps.iter().cloned(),
        );

        let mut features = FeatureManager::new(Duration::from_secs(config.hooks.timeout_secs));
        for hook in self.hooks {
            features.register(hook);
        }

        let control = self.control.unwrap_or_default();
        let receiver = control.receiver();

        Ok(StepOrchestrator {
            config,
            session,
            machine: CrawlStateMachine::new(),
            device,
            grounding,
            decision,
            executor,
            recovery,
            identity: ScreenIdentity::new(),
            repository: self
                .repository
                .unwrap_or_else(|| Arc::new(MemoryRepository::new())),
            events: self.events.unwrap_or_else(|| Arc::new(NullEventSink)),
            features,
            control,
            receiver,
            clock: None,
            step: 0,
            history: Vec::new(),
            unpersisted: None,
            current_screen: None,
            streak: 0,
            visits: HashMap::new(),
            stuck: None,
            empty_steps: 0,
            failed_steps: 0,
            completion: None,
            artifacts: Vec::new(),
        })
    }
}
