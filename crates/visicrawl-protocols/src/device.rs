//! Device adapter protocol definitions.
//!
//! A device adapter is the only way the engine touches the device under test:
//! capturing the screen, dispatching gestures and asking which application is
//! in the foreground.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DeviceError;
use crate::types::{ActionKind, Point, Screenshot};

/// Core trait for device adapters.
#[async_trait]
pub trait DeviceAdapter: Send + Sync {
    /// Returns the adapter/device ID.
    fn id(&self) -> &str;

    /// Capture the current screen.
    async fn capture_screenshot(&self) -> Result<Screenshot, DeviceError>;

    /// Dispatch a single gesture and report whether it navigated.
    async fn execute_gesture(&self, gesture: &Gesture) -> Result<GestureOutcome, DeviceError>;

    /// Current foreground application, `None` when it cannot be determined.
    async fn foreground_app(&self) -> Result<Option<ForegroundApp>, DeviceError>;

    /// Force-stop and relaunch an application.
    async fn launch_app(&self, app_id: &str) -> Result<(), DeviceError>;

    /// Re-establish the connection to the device.
    async fn reconnect(&self) -> Result<(), DeviceError>;
}

/// A resolved gesture ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gesture {
    pub kind: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Press duration for long presses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hold: Option<Duration>,
}

impl Gesture {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            point: None,
            text: None,
            hold: None,
        }
    }

    pub fn at(mut self, point: Point) -> Self {
        self.point = Some(point);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_hold(mut self, hold: Duration) -> Self {
        self.hold = Some(hold);
        self
    }
}

/// What a gesture did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GestureOutcome {
    pub navigated: bool,
}

impl GestureOutcome {
    pub fn navigated() -> Self {
        Self { navigated: true }
    }

    pub fn stayed() -> Self {
        Self { navigated: false }
    }
}

/// Application currently holding the foreground.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForegroundApp {
    pub app_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<String>,
}

impl ForegroundApp {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            activity: None,
        }
    }

    pub fn with_activity(mut self, activity: impl Into<String>) -> Self {
        self.activity = Some(activity.into());
        self
    }
}
