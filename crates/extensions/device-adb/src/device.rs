//! adb-backed device adapter.

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use visicrawl_config::DeviceConfig;
use visicrawl_protocols::{
    DeviceAdapter, DeviceError, ForegroundApp, Gesture, GestureOutcome, Screenshot,
};

use crate::focus::{focus_signature, parse_focus, parse_wm_size};
use crate::input::plan_gesture;
use crate::runner::AdbRunner;

const NAVIGATION_PROBE_DELAY: Duration = Duration::from_millis(250);
const LAUNCHER_CATEGORY: &str = "android.intent.category.LAUNCHER";

/// Android device reached through `adb`.
///
/// Navigation is detected by comparing the focused window before and after
/// each gesture.
pub struct AdbDevice {
    id: String,
    runner: AdbRunner,
    screen_size: Mutex<Option<(u32, u32)>>,
    probe_delay: Duration,
}

impl AdbDevice {
    pub fn new(adb_path: impl Into<String>, serial: Option<String>) -> Self {
        let id = serial.clone().unwrap_or_else(|| "adb".to_string());
        Self {
            id,
            runner: AdbRunner::new(adb_path, serial, Duration::from_secs(15)),
            screen_size: Mutex::new(None),
            probe_delay: NAVIGATION_PROBE_DELAY,
        }
    }

    pub fn from_config(config: &DeviceConfig) -> Self {
        Self::new(config.adb_path.clone(), config.serial.clone())
            .with_timeout(Duration::from_secs(config.command_timeout_secs))
    }

    /// Per-command timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.runner.set_timeout(timeout);
        self
    }

    /// Wait before the post-gesture focus probe.
    pub fn with_navigation_probe_delay(mut self, delay: Duration) -> Self {
        self.probe_delay = delay;
        self
    }

    pub fn serial(&self) -> Option<&str> {
        self.runner.serial()
    }

    async fn screen_size(&self) -> Result<(u32, u32), DeviceError> {
        let cached = *self.screen_size.lock();
        if let Some(size) = cached {
            return Ok(size);
        }
        let output = self.runner.shell(&["wm", "size"]).await?;
        let size = parse_wm_size(&output)
            .ok_or_else(|| DeviceError::InvalidOutput(format!("unexpected wm size output: {}", output.trim())))?;
        *self.screen_size.lock() = Some(size);
        Ok(size)
    }

    async fn window_dump(&self) -> Result<String, DeviceError> {
        self.runner.shell(&["dumpsys", "window"]).await
    }

    /// Focus line for navigation detection; a failed probe yields `None`.
    async fn probe_focus(&self) -> Option<String> {
        match self.window_dump().await {
            Ok(dump) => focus_signature(&dump),
            Err(e) => {
                debug!(device = %self.id, error = %e, "Focus probe failed");
                None
            }
        }
    }
}

#[async_trait]
impl DeviceAdapter for AdbDevice {
    fn id(&self) -> &str {
        &self.id
    }

    async fn capture_screenshot(&self) -> Result<Screenshot, DeviceError> {
        let data = self.runner.run(&["exec-out", "screencap", "-p"]).await?;
        if data.is_empty() {
            return Err(DeviceError::InvalidOutput("empty screenshot".to_string()));
        }

        let (width, height) = image::ImageReader::new(Cursor::new(&data))
            .with_guessed_format()
            .map_err(|e| DeviceError::InvalidOutput(e.to_string()))?
            .into_dimensions()
            .map_err(|e| DeviceError::InvalidOutput(format!("screenshot is not an image: {}", e)))?;

        *self.screen_size.lock() = Some((width, height));
        Ok(Screenshot::new(data, width, height))
    }

    async fn execute_gesture(&self, gesture: &Gesture) -> Result<GestureOutcome, DeviceError> {
        let plan = plan_gesture(gesture, self.screen_size().await?)?;
        let before = self.probe_focus().await;

        for command in &plan {
            let args: Vec<&str> = command.iter().map(String::as_str).collect();
            self.runner.shell(&args).await?;
        }

        if !self.probe_delay.is_zero() {
            tokio::time::sleep(self.probe_delay).await;
        }
        let after = self.probe_focus().await;

        let navigated = matches!((&before, &after), (Some(b), Some(a)) if a != b);
        debug!(device = %self.id, kind = %gesture.kind, navigated, "Gesture dispatched");
        Ok(GestureOutcome { navigated })
    }

    async fn foreground_app(&self) -> Result<Option<ForegroundApp>, DeviceError> {
        let dump = self.window_dump().await?;
        Ok(parse_focus(&dump))
    }

    async fn launch_app(&self, app_id: &str) -> Result<(), DeviceError> {
        if app_id.is_empty()
            || !app_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_')
        {
            return Err(DeviceError::CommandFailed(format!("invalid application id: {}", app_id)));
        }

        info!(device = %self.id, app = %app_id, "Relaunching application");
        self.runner.shell(&["am", "force-stop", app_id]).await?;
        let output = self
            .runner
            .shell(&["monkey", "-p", app_id, "-c", LAUNCHER_CATEGORY, "1"])
            .await?;
        if output.contains("No activities found") || output.contains("monkey aborted") {
            return Err(DeviceError::CommandFailed(format!("no launchable activity for {}", app_id)));
        }
        Ok(())
    }

    async fn reconnect(&self) -> Result<(), DeviceError> {
        info!(device = %self.id, "Reconnecting");
        if let Err(e) = self.runner.run(&["reconnect"]).await {
            warn!(device = %self.id, error = %e, "adb reconnect failed, probing anyway");
        }

        match self.runner.run(&["wait-for-device"]).await {
            Ok(_) => {}
            Err(DeviceError::Timeout(ms)) => {
                return Err(DeviceError::Unreachable(format!(
                    "device did not come back within {} ms",
                    ms
                )));
            }
            Err(e) => return Err(e),
        }

        let state = self.runner.run(&["get-state"]).await?;
        let state = String::from_utf8_lossy(&state).trim().to_string();
        if state == "device" {
            *self.screen_size.lock() = None;
            Ok(())
        } else {
            Err(DeviceError::Unreachable(format!("device state is {}", state)))
        }
    }
}

#[cfg(all(test, unix))]
#[path = "device_tests.rs"]
mod tests;
