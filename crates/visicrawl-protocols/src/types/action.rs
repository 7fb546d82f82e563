//! Action descriptors and per-action results.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{BoundingBox, Point};

/// Maximum number of actions accepted in one decision batch.
pub const MAX_BATCH_ACTIONS: usize = 12;

/// Kind of gesture requested by the decision provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Tap,
    LongPress,
    TypeText,
    ScrollUp,
    ScrollDown,
    SwipeLeft,
    SwipeRight,
    Back,
}

impl ActionKind {
    pub const ALL: [ActionKind; 8] = [
        ActionKind::Tap,
        ActionKind::LongPress,
        ActionKind::TypeText,
        ActionKind::ScrollUp,
        ActionKind::ScrollDown,
        ActionKind::SwipeLeft,
        ActionKind::SwipeRight,
        ActionKind::Back,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Tap => "tap",
            ActionKind::LongPress => "long_press",
            ActionKind::TypeText => "type_text",
            ActionKind::ScrollUp => "scroll_up",
            ActionKind::ScrollDown => "scroll_down",
            ActionKind::SwipeLeft => "swipe_left",
            ActionKind::SwipeRight => "swipe_right",
            ActionKind::Back => "back",
        }
    }

    /// Tap and long press must name what they touch.
    pub fn requires_target(&self) -> bool {
        matches!(self, ActionKind::Tap | ActionKind::LongPress)
    }

    pub fn requires_text(&self) -> bool {
        matches!(self, ActionKind::TypeText)
    }

    /// Scrolls and swipes fall back to the screen center without a target.
    pub fn is_directional(&self) -> bool {
        matches!(
            self,
            ActionKind::ScrollUp
                | ActionKind::ScrollDown
                | ActionKind::SwipeLeft
                | ActionKind::SwipeRight
        )
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        ActionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| format!("unknown action kind '{}'", s))
    }
}

/// Where an action should land.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTarget {
    /// A grounding label assigned for the current step.
    Label(u32),
    /// An explicit screen coordinate.
    Point(Point),
    /// An explicit region; the action lands on its center.
    Bounds(BoundingBox),
}

impl fmt::Display for ActionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionTarget::Label(label) => write!(f, "#{}", label),
            ActionTarget::Point(point) => write!(f, "@{}", point),
            ActionTarget::Bounds(b) => write!(f, "[{},{} {}x{}]", b.x, b.y, b.width, b.height),
        }
    }
}

/// One requested action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub kind: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<ActionTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub rationale: String,
}

impl ActionDescriptor {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            target: None,
            text: None,
            rationale: String::new(),
        }
    }

    pub fn tap_label(label: u32) -> Self {
        Self::new(ActionKind::Tap).with_target(ActionTarget::Label(label))
    }

    pub fn back() -> Self {
        Self::new(ActionKind::Back)
    }

    pub fn with_target(mut self, target: ActionTarget) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = rationale.into();
        self
    }

    /// Short single-line rendering, e.g. `tap #3` or `type_text #2 "alice"`.
    pub fn compact(&self) -> String {
        let mut out = self.kind.as_str().to_string();
        if let Some(target) = &self.target {
            out.push(' ');
            out.push_str(&target.to_string());
        }
        if let Some(text) = &self.text {
            out.push_str(&format!(" {:?}", text));
        }
        out
    }
}

/// Why a single action failed.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionError {
    #[error("Unknown grounding label: {label}")]
    UnknownLabel { label: u32 },

    #[error("Target {point} is outside the {width}x{height} screen")]
    OutOfBounds { point: Point, width: u32, height: u32 },

    #[error("Action {kind} requires a target")]
    MissingTarget { kind: ActionKind },

    #[error("Action type_text requires non-empty text")]
    MissingText,

    #[error("Gesture failed: {message}")]
    Gesture { message: String },

    #[error("Device unreachable: {message}")]
    DeviceUnreachable { message: String },
}

/// Outcome of executing one descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    /// Position of the descriptor in its batch, from 0.
    pub index: usize,
    pub kind: ActionKind,
    pub success: bool,
    pub duration_ms: u64,
    /// Whether the gesture moved the application to a different window.
    pub navigated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ActionError>,
}

impl ActionResult {
    pub fn succeeded(
        index: usize,
        kind: ActionKind,
        point: Option<Point>,
        navigated: bool,
        duration_ms: u64,
    ) -> Self {
        Self {
            index,
            kind,
            success: true,
            duration_ms,
            navigated,
            point,
            error: None,
        }
    }

    pub fn failed(
        index: usize,
        kind: ActionKind,
        point: Option<Point>,
        error: ActionError,
        duration_ms: u64,
    ) -> Self {
        Self {
            index,
            kind,
            success: false,
            duration_ms,
            navigated: false,
            point,
            error: Some(error),
        }
    }
}
