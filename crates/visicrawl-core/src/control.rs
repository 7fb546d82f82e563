//! Cooperative pause, step-mode and stop signalling.
//!
//! [`CrawlControl`] is the handle given to front ends. The orchestrator holds
//! the matching [`ControlReceiver`] and only looks at it at its checkpoints:
//! between steps and between sub-operations of a step, never mid-gesture.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Snapshot of the control flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlState {
    /// Manual pause requested.
    pub paused: bool,
    /// Step-by-step mode: every step waits for an advance.
    pub step_mode: bool,
    /// Advances requested but not yet consumed by a step.
    pub pending_advances: u32,
}

/// Why the loop must wait at a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseKind {
    Manual,
    Step,
}

/// Cloneable handle controlling one crawl session.
#[derive(Clone)]
pub struct CrawlControl {
    state: Arc<watch::Sender<ControlState>>,
    cancel: CancellationToken,
}

impl CrawlControl {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ControlState::default());
        Self {
            state: Arc::new(tx),
            cancel: CancellationToken::new(),
        }
    }

    pub fn pause(&self) {
        debug!("Pause requested");
        self.state.send_modify(|s| s.paused = true);
    }

    pub fn resume(&self) {
        debug!("Resume requested");
        self.state.send_modify(|s| s.paused = false);
    }

    /// Toggle step-by-step mode. Pending advances are discarded either way.
    pub fn set_step_mode(&self, enabled: bool) {
        debug!(enabled, "Step mode changed");
        self.state.send_modify(|s| {
            s.step_mode = enabled;
            s.pending_advances = 0;
        });
    }

    /// Let one step run in step-by-step mode.
    pub fn advance(&self) {
        self.state.send_modify(|s| {
            if s.step_mode {
                s.pending_advances = s.pending_advances.saturating_add(1);
            }
        });
    }

    /// Request a graceful stop.
    pub fn stop(&self) {
        debug!("Stop requested");
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn snapshot(&self) -> ControlState {
        *self.state.borrow()
    }

    pub(crate) fn receiver(&self) -> ControlReceiver {
        ControlReceiver {
            rx: self.state.subscribe(),
            state: Arc::clone(&self.state),
            cancel: self.cancel.clone(),
        }
    }
}

impl Default for CrawlControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Orchestrator side of [`CrawlControl`].
pub struct ControlReceiver {
    rx: watch::Receiver<ControlState>,
    state: Arc<watch::Sender<ControlState>>,
    cancel: CancellationToken,
}

impl ControlReceiver {
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// What the loop must wait for at this checkpoint, if anything.
    ///
    /// At a step boundary in step mode one pending advance is consumed.
    pub fn gate(&mut self, step_boundary: bool) -> Option<PauseKind> {
        let current = *self.rx.borrow_and_update();
        if current.paused {
            return Some(PauseKind::Manual);
        }
        if !(step_boundary && current.step_mode) {
            return None;
        }
        if current.pending_advances == 0 {
            return Some(PauseKind::Step);
        }

        let mut consumed = false;
        self.state.send_if_modified(|s| {
            if s.step_mode && s.pending_advances > 0 {
                s.pending_advances -= 1;
                consumed = true;
            }
            consumed
        });
        // Mark our own update as seen.
        self.rx.borrow_and_update();

        if consumed { None } else { Some(PauseKind::Step) }
    }

    /// Wait for the next control change.
    ///
    /// Returns `false` once a stop was requested.
    pub async fn changed(&mut self) -> bool {
        if self.is_stopped() {
            return false;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            res = self.rx.changed() => {
                if res.is_err() {
                    warn!("Control channel closed while paused, resuming");
                }
                true
            }
        }
    }
}
