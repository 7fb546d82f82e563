//! Persistence protocol definitions.
//!
//! The repository is write-only from the engine's point of view: in-session
//! memory (journal, visit counts) is kept locally and never read back.

use async_trait::async_trait;

use crate::error::RepositoryError;
use crate::types::{ActionKind, CrawlSession, Screen, ScreenId, SessionSummary, StepRecord};

/// Core trait for crawl persistence backends.
#[async_trait]
pub trait CrawlRepository: Send + Sync {
    /// Record a new run.
    async fn create_run(&self, session: &CrawlSession) -> Result<(), RepositoryError>;

    /// Append a finished step.
    async fn append_step(&self, record: &StepRecord) -> Result<(), RepositoryError>;

    /// Insert or update a discovered screen.
    async fn upsert_screen(&self, screen: &Screen) -> Result<(), RepositoryError>;

    /// Record an edge of the screen graph.
    async fn record_transition(
        &self,
        session_id: &str,
        from: ScreenId,
        to: ScreenId,
        action: ActionKind,
    ) -> Result<(), RepositoryError>;

    /// Persist final statistics for a run.
    async fn complete_run(&self, summary: &SessionSummary) -> Result<(), RepositoryError>;
}
