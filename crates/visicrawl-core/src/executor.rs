//! Action execution.
//!
//! A batch runs in order and stops at the first failure. Descriptors after a
//! failure are never attempted and get no result entry. The stop token is
//! checked between actions only; a gesture in flight always completes.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use visicrawl_config::ExecutorConfig;
use visicrawl_protocols::{
    ActionDescriptor, ActionError, ActionKind, ActionResult, ActionTarget, DeviceAdapter,
    DeviceError, Gesture, Point,
};

use crate::grounding::GroundingOverlay;

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;

/// Results of one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchExecution {
    pub results: Vec<ActionResult>,
    /// A stop request interrupted the batch between actions.
    pub stopped: bool,
}

impl BatchExecution {
    /// The failing result, if the batch aborted.
    pub fn failure(&self) -> Option<&ActionResult> {
        self.results.iter().find(|r| !r.success)
    }

    pub fn navigated(&self) -> bool {
        self.results.last().is_some_and(|r| r.navigated)
    }
}

/// Translates action descriptors into device gestures.
pub struct ActionExecutor {
    device: Arc<dyn DeviceAdapter>,
    settle_delay: Duration,
    long_press: Duration,
}

impl ActionExecutor {
    pub fn new(device: Arc<dyn DeviceAdapter>, config: &ExecutorConfig) -> Self {
        Self {
            device,
            settle_delay: Duration::from_millis(config.settle_delay_ms),
            long_press: Duration::from_millis(config.long_press_ms),
        }
    }

    /// Execute a batch against the current overlay.
    pub async fn execute(
        &self,
        batch: &[ActionDescriptor],
        overlay: &GroundingOverlay,
        cancel: &CancellationToken,
    ) -> BatchExecution {
        let mut execution = BatchExecution::default();

        for (index, action) in batch.iter().enumerate() {
            if cancel.is_cancelled() {
                debug!(index, "Stop requested, abandoning remaining actions");
                execution.stopped = true;
                break;
            }

            let result = self.execute_one(index, action, overlay).await;
            let failed = !result.success;
            execution.results.push(result);

            if failed {
                break;
            }
            if !self.settle_delay.is_zero() {
                sleep(self.settle_delay).await;
            }
        }

        execution
    }

    async fn execute_one(
        &self,
        index: usize,
        action: &ActionDescriptor,
        overlay: &GroundingOverlay,
    ) -> ActionResult {
        let started = Instant::now();
        let elapsed = |started: Instant| started.elapsed().as_millis() as u64;

        let gesture = match self.build_gesture(action, overlay) {
            Ok(gesture) => gesture,
            Err(error) => {
                warn!(index, action = %action.compact(), %error, "Action rejected");
                return ActionResult::failed(index, action.kind, None, error, elapsed(started));
            }
        };
        let point = gesture.point;

        match self.device.execute_gesture(&gesture).await {
            Ok(outcome) => {
                debug!(index, action = %action.compact(), navigated = outcome.navigated, "Action executed");
                ActionResult::succeeded(index, action.kind, point, outcome.navigated, elapsed(started))
            }
            Err(e) => {
                warn!(index, action = %action.compact(), error = %e, "Gesture failed");
                ActionResult::failed(index, action.kind, point, gesture_error(e), elapsed(started))
            }
        }
    }

    fn build_gesture(
        &self,
        action: &ActionDescriptor,
        overlay: &GroundingOverlay,
    ) -> Result<Gesture, ActionError> {
        let mut gesture = Gesture::new(action.kind);

        if action.kind != ActionKind::Back {
            if let Some(point) = resolve_target(action, overlay)? {
                gesture = gesture.at(point);
            }
        }

        match action.kind {
            ActionKind::TypeText => {
                let text = action
                    .text
                    .as_deref()
                    .filter(|t| !t.trim().is_empty())
                    .ok_or(ActionError::MissingText)?;
                gesture = gesture.with_text(text);
            }
            ActionKind::LongPress => gesture = gesture.with_hold(self.long_press),
            _ => {}
        }

        Ok(gesture)
    }
}

/// Resolve the screen coordinate an action lands on.
///
/// Labels resolve through the overlay, points verbatim, bounds to their
/// center. Scrolls and swipes without a target use the screen center.
pub fn resolve_target(
    action: &ActionDescriptor,
    overlay: &GroundingOverlay,
) -> Result<Option<Point>, ActionError> {
    let screen = overlay.image();
    let point = match action.target {
        Some(ActionTarget::Label(label)) => overlay
            .resolve(label)
            .ok_or(ActionError::UnknownLabel { label })?,
        Some(ActionTarget::Point(point)) => point,
        Some(ActionTarget::Bounds(bounds)) => bounds.center(),
        None if action.kind.requires_target() => {
            return Err(ActionError::MissingTarget { kind: action.kind });
        }
        None if action.kind.is_directional() => screen.center(),
        None => return Ok(None),
    };

    if !screen.contains(point) {
        return Err(ActionError::OutOfBounds {
            point,
            width: screen.width,
            height: screen.height,
        });
    }
    Ok(Some(point))
}

fn gesture_error(error: DeviceError) -> ActionError {
    match error {
        DeviceError::Unreachable(message) => ActionError::DeviceUnreachable { message },
        other => ActionError::Gesture {
            message: other.to_string(),
        },
    }
}
