//! Active-time accounting.
//!
//! Active time is wall-clock time since start minus every pause interval,
//! including a pause that is still open.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct PauseClock {
    started: Instant,
    paused: Duration,
    pause_started: Option<Instant>,
}

impl PauseClock {
    /// Start counting now.
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            paused: Duration::ZERO,
            pause_started: None,
        }
    }

    /// Open a pause interval. No-op when already paused.
    pub fn begin_pause(&mut self) {
        if self.pause_started.is_none() {
            self.pause_started = Some(Instant::now());
        }
    }

    /// Close the open pause interval. No-op when not paused.
    pub fn end_pause(&mut self) {
        if let Some(since) = self.pause_started.take() {
            self.paused += since.elapsed();
        }
    }

    pub fn is_paused(&self) -> bool {
        self.pause_started.is_some()
    }

    /// Sum of all pause intervals so far.
    pub fn paused(&self) -> Duration {
        self.paused + self.pause_started.map(|since| since.elapsed()).unwrap_or_default()
    }

    pub fn wall_elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn active_elapsed(&self) -> Duration {
        self.wall_elapsed().saturating_sub(self.paused())
    }
}
