//! # VisiCrawl Core
//!
//! Exploration engine that drives a device through a target application one
//! step at a time:
//!
//! ```text
//! capture ─▶ ground ─▶ resolve screen ─▶ decide ─▶ execute ─▶ assess
//!    ▲                                                          │
//!    └──────────── pause / stop checkpoints, budgets ◀──────────┘
//! ```
//!
//! ## Key Components
//!
//! - [`StepOrchestrator`]: Owns a session and runs the step loop
//! - [`CrawlControl`]: Pause, resume, step mode and stop from any task
//! - [`VisualGroundingEngine`]: Numbered labels over detected text
//! - [`DecisionClient`]: Prompt assembly, retries and response validation
//! - [`ActionExecutor`]: Batch execution with stop-on-first-failure
//! - [`ScreenIdentity`]: Perceptual-hash screen deduplication
//! - [`RecoveryCoordinator`]: Failure classification and remedies
//! - [`CrawlStateMachine`]: Session lifecycle states
//! - [`EventBridge`]: Non-blocking event delivery to observers
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use visicrawl_config::CrawlConfig;
//! use visicrawl_core::StepOrchestrator;
//! # use visicrawl_protocols::{DecisionProvider, DeviceAdapter, TextDetector};
//! # async fn demo(
//! #     device: Arc<dyn DeviceAdapter>,
//! #     provider: Arc<dyn DecisionProvider>,
//! #     detector: Arc<dyn TextDetector>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let config = CrawlConfig::default();
//! let mut orchestrator = StepOrchestrator::builder(config)
//!     .device(device)
//!     .provider(provider)
//!     .detector(detector)
//!     .build()?;
//!
//! let summary = orchestrator.run().await?;
//! println!("{} steps, finished with {}", summary.total_steps, summary.reason);
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod control;
pub mod decision;
pub mod error;
pub mod events;
pub mod executor;
pub mod grounding;
pub mod hooks;
pub mod identity;
pub mod journal;
pub mod memory_repository;
pub mod orchestrator;
mod orchestrator_lifecycle;
mod orchestrator_step;
pub mod prompt;
pub mod recovery;
pub mod retry;
pub mod state_machine;
pub mod telemetry;

// Re-exports
pub use clock::PauseClock;
pub use control::{ControlState, CrawlControl};
pub use decision::{DecisionClient, DecisionOutcome, ParsedDecision};
pub use error::{CrawlError, CrawlResult, GroundingError, IdentityError};
pub use events::{BridgeHandle, ChannelEventSink, EventBridge, EventObserver, RecordingEventSink, TracingObserver};
pub use executor::{ActionExecutor, BatchExecution};
pub use grounding::{GroundedElement, GroundingOverlay, VisualGroundingEngine};
pub use hooks::FeatureManager;
pub use identity::{Resolution, ScreenGraph, ScreenIdentity, SIMILARITY_THRESHOLD};
pub use journal::{JournalEntry, JOURNAL_WINDOW};
pub use memory_repository::{MemoryRepository, RunSnapshot};
pub use orchestrator::{StepOrchestrator, StepOrchestratorBuilder};
pub use prompt::DecisionRequest;
pub use recovery::{RecoveryCoordinator, Remedy, Verdict};
pub use retry::RetryPolicy;
pub use state_machine::{CrawlStateMachine, StateTransition};
pub use telemetry::{init_tracing, TelemetryError};
// Re-export CancellationToken for convenience
pub use tokio_util::sync::CancellationToken;
