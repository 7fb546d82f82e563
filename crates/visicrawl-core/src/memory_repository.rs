//! In-memory crawl repository.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use visicrawl_protocols::{
    ActionKind, CrawlRepository, CrawlSession, RepositoryError, Screen, ScreenId, SessionSummary,
    StepRecord, Transition,
};

/// Everything stored for one run.
#[derive(Debug, Clone)]
pub struct RunSnapshot {
    pub session: CrawlSession,
    pub steps: Vec<StepRecord>,
    pub screens: Vec<Screen>,
    pub transitions: Vec<Transition>,
    pub summary: Option<SessionSummary>,
}

/// Repository keeping runs in memory. Used when no backend is configured.
pub struct MemoryRepository {
    runs: RwLock<HashMap<String, RunSnapshot>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self {
            runs: RwLock::new(HashMap::new()),
        }
    }

    /// Copy of a stored run.
    pub async fn snapshot(&self, session_id: &str) -> Option<RunSnapshot> {
        self.runs.read().await.get(session_id).cloned()
    }

    pub async fn run_ids(&self) -> Vec<String> {
        self.runs.read().await.keys().cloned().collect()
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(session_id: &str) -> RepositoryError {
    RepositoryError::RunNotFound(session_id.to_string())
}

#[async_trait]
impl CrawlRepository for MemoryRepository {
    async fn create_run(&self, session: &CrawlSession) -> Result<(), RepositoryError> {
        let mut runs = self.runs.write().await;
        if runs.contains_key(&session.id) {
            return Err(RepositoryError::Storage(format!(
                "run {} already exists",
                session.id
            )));
        }
        runs.insert(
            session.id.clone(),
            RunSnapshot {
                session: session.clone(),
                steps: Vec::new(),
                screens: Vec::new(),
                transitions: Vec::new(),
                summary: None,
            },
        );
        Ok(())
    }

    async fn append_step(&self, record: &StepRecord) -> Result<(), RepositoryError> {
        let mut runs = self.runs.write().await;
        let run = runs
            .get_mut(&record.session_id)
            .ok_or_else(|| not_found(&record.session_id))?;
        run.steps.push(record.clone());
        Ok(())
    }

    async fn upsert_screen(&self, screen: &Screen) -> Result<(), RepositoryError> {
        let mut runs = self.runs.write().await;
        let run = runs
            .get_mut(&screen.first_seen_session)
            .ok_or_else(|| not_found(&screen.first_seen_session))?;
        match run.screens.iter_mut().find(|s| s.id == screen.id) {
            Some(existing) => *existing = screen.clone(),
            None => run.screens.push(screen.clone()),
        }
        Ok(())
    }

    async fn record_transition(
        &self,
        session_id: &str,
        from: ScreenId,
        to: ScreenId,
        action: ActionKind,
    ) -> Result<(), RepositoryError> {
        let mut runs = self.runs.write().await;
        let run = runs.get_mut(session_id).ok_or_else(|| not_found(session_id))?;
        run.transitions.push(Transition { from, to, action });
        Ok(())
    }

    async fn complete_run(&self, summary: &SessionSummary) -> Result<(), RepositoryError> {
        let mut runs = self.runs.write().await;
        let run = runs
            .get_mut(&summary.session_id)
            .ok_or_else(|| not_found(&summary.session_id))?;
        run.session.state = summary.final_state;
        run.summary = Some(summary.clone());
        Ok(())
    }
}
