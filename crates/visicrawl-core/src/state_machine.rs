//! Crawl session lifecycle.
//!
//! ```text
//! Uninitialized -> Initializing -> Running -> Stopping -> Stopped
//!                                  Running <-> PausedManual
//!                                  Running <-> PausedStep
//! any non-terminal state -> Error
//! ```
//!
//! Requests outside the table are rejected with
//! [`CrawlError::InvalidTransition`] and logged.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use visicrawl_protocols::CrawlState;

use crate::error::CrawlError;

#[cfg(test)]
#[path = "state_machine_tests.rs"]
mod tests;

/// One accepted transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransition {
    pub from: CrawlState,
    pub to: CrawlState,
    pub at: DateTime<Utc>,
}

/// Lifecycle state holder owned by the orchestrator.
#[derive(Debug)]
pub struct CrawlStateMachine {
    state: CrawlState,
    history: Vec<StateTransition>,
}

impl CrawlStateMachine {
    pub fn new() -> Self {
        Self {
            state: CrawlState::Uninitialized,
            history: Vec::new(),
        }
    }

    pub fn state(&self) -> CrawlState {
        self.state
    }

    /// Accepted transitions in order.
    pub fn history(&self) -> &[StateTransition] {
        &self.history
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Whether `from -> to` is in the lifecycle table.
    pub fn is_legal(from: CrawlState, to: CrawlState) -> bool {
        use CrawlState::*;

        if to == Error {
            return !from.is_terminal();
        }

        matches!(
            (from, to),
            (Uninitialized, Initializing)
                | (Initializing, Running)
                | (Running, PausedManual)
                | (PausedManual, Running)
                | (Running, PausedStep)
                | (PausedStep, Running)
                | (Running, Stopping)
                | (Stopping, Stopped)
        )
    }

    /// Move to `to`, or reject without changing state.
    pub fn transition(&mut self, to: CrawlState) -> Result<(), CrawlError> {
        let from = self.state;
        if !Self::is_legal(from, to) {
            warn!(%from, %to, "Rejected crawl state transition");
            return Err(CrawlError::InvalidTransition { from, to });
        }

        debug!(%from, %to, "Crawl state transition");
        self.state = to;
        self.history.push(StateTransition {
            from,
            to,
            at: Utc::now(),
        });
        Ok(())
    }
}

impl Default for CrawlStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
