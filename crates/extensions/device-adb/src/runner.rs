//! adb process invocation.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tokio::time::timeout;
use tracing::trace;

use visicrawl_protocols::DeviceError;

/// Runs adb commands against one device with a per-command timeout.
#[derive(Debug, Clone)]
pub(crate) struct AdbRunner {
    adb_path: String,
    serial: Option<String>,
    timeout: Duration,
}

impl AdbRunner {
    pub(crate) fn new(adb_path: impl Into<String>, serial: Option<String>, timeout: Duration) -> Self {
        Self {
            adb_path: adb_path.into(),
            serial,
            timeout,
        }
    }

    pub(crate) fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub(crate) fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.adb_path);
        if let Some(serial) = &self.serial {
            cmd.arg("-s").arg(serial);
        }
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Run `adb <args>` and return stdout.
    pub(crate) async fn run(&self, args: &[&str]) -> Result<Vec<u8>, DeviceError> {
        let started = Instant::now();
        let output = timeout(self.timeout, self.command(args).output())
            .await
            .map_err(|_| DeviceError::Timeout(self.timeout.as_millis() as u64))?
            .map_err(|e| DeviceError::CommandFailed(format!("failed to run {}: {}", self.adb_path, e)))?;

        trace!(
            args = ?args,
            status = ?output.status.code(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "adb command finished"
        );

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(classify_failure(&stderr, output.status.code()));
        }
        // adb can exit 0 after losing the transport mid-command.
        if is_unreachable_message(&stderr) {
            return Err(DeviceError::Unreachable(stderr.trim().to_string()));
        }
        Ok(output.stdout)
    }

    /// Run `adb shell <args>` and return stdout as text.
    pub(crate) async fn shell(&self, args: &[&str]) -> Result<String, DeviceError> {
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push("shell");
        full.extend_from_slice(args);
        let stdout = self.run(&full).await?;
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }
}

/// Whether adb's error output says the device itself is gone.
pub(crate) fn is_unreachable_message(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    const MARKERS: [&str; 7] = [
        "device offline",
        "no devices/emulators found",
        "device unauthorized",
        "device still authorizing",
        "error: closed",
        "cannot connect to daemon",
        "protocol fault",
    ];
    MARKERS.iter().any(|marker| lower.contains(marker))
        || (lower.contains("device '") && lower.contains("not found"))
}

pub(crate) fn classify_failure(stderr: &str, code: Option<i32>) -> DeviceError {
    let message = stderr.trim();
    if is_unreachable_message(message) {
        return DeviceError::Unreachable(message.to_string());
    }
    match code {
        Some(code) if message.is_empty() => DeviceError::CommandFailed(format!("adb exited with {}", code)),
        Some(code) => DeviceError::CommandFailed(format!("adb exited with {}: {}", code, message)),
        None => DeviceError::CommandFailed("adb terminated by signal".to_string()),
    }
}
