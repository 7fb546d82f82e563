//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Root configuration for one crawl.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlConfig {
    #[serde(default)]
    pub target: TargetConfig,

    #[serde(default)]
    pub budget: BudgetConfig,

    #[serde(default)]
    pub decision: DecisionConfig,

    #[serde(default)]
    pub grounding: GroundingConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    pub recovery: RecoveryConfig,

    #[serde(default)]
    pub hooks: HooksConfig,

    #[serde(default)]
    pub artifacts: ArtifactsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub device: DeviceConfig,
}

/// Application under exploration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Application identifier (package name).
    #[serde(default)]
    pub app_id: String,

    #[serde(default = "default_goal")]
    pub goal: String,

    /// Foreground applications that do not count as leaving the target
    /// (browsers for OAuth, system pickers).
    #[serde(default)]
    pub allowed_apps: Vec<String>,

    /// Relaunch the target before the first step.
    #[serde(default = "default_true")]
    pub launch_on_start: bool,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            goal: default_goal(),
            allowed_apps: Vec::new(),
            launch_on_start: default_true(),
        }
    }
}

fn default_goal() -> String {
    "Explore the application and reach as many distinct screens as possible".to_string()
}

fn default_true() -> bool {
    true
}

/// Step and duration budgets. At least one must be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BudgetConfig {
    #[serde(default)]
    pub max_steps: Option<u32>,

    /// Active (non-paused) time limit in seconds.
    #[serde(default)]
    pub max_duration_secs: Option<u64>,
}

/// Decision provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionConfig {
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default)]
    pub model: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Retries after the first attempt for transport failures and timeouts.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_retry_initial_delay")]
    pub retry_initial_delay_ms: u64,

    #[serde(default = "default_retry_max_delay")]
    pub retry_max_delay_ms: u64,

    #[serde(default = "default_retry_multiplier")]
    pub retry_backoff_multiplier: f64,

    /// Spread retry delays by up to 10% either way.
    #[serde(default)]
    pub retry_jitter: bool,

    /// Adapter-specific options.
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: String::new(),
            api_key: None,
            base_url: None,
            max_retries: default_max_retries(),
            request_timeout_secs: default_request_timeout(),
            retry_initial_delay_ms: default_retry_initial_delay(),
            retry_max_delay_ms: default_retry_max_delay(),
            retry_backoff_multiplier: default_retry_multiplier(),
            retry_jitter: false,
            extra: HashMap::new(),
        }
    }
}

fn default_provider() -> String {
    "default".to_string()
}

fn default_max_retries() -> u32 {
    2
}

fn default_request_timeout() -> u64 {
    60
}

fn default_retry_initial_delay() -> u64 {
    500
}

fn default_retry_max_delay() -> u64 {
    5000
}

fn default_retry_multiplier() -> f64 {
    2.0
}

/// Visual grounding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundingConfig {
    /// Detections below this confidence are dropped.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,

    /// Boxes whose top edges differ by at most this many pixels share a row.
    #[serde(default = "default_row_tolerance")]
    pub row_tolerance_px: u32,

    /// TrueType/OpenType font used to draw label numbers. Unset uses the
    /// bundled DejaVu Sans Mono Bold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_path: Option<PathBuf>,

    #[serde(default = "default_label_font_size")]
    pub label_font_size: f32,
}

impl Default for GroundingConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            row_tolerance_px: default_row_tolerance(),
            font_path: None,
            label_font_size: default_label_font_size(),
        }
    }
}

fn default_min_confidence() -> f32 {
    0.3
}

fn default_row_tolerance() -> u32 {
    12
}

fn default_label_font_size() -> f32 {
    18.0
}

/// Action execution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Pause after each gesture so the UI can settle.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,

    #[serde(default = "default_long_press")]
    pub long_press_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay(),
            long_press_ms: default_long_press(),
        }
    }
}

fn default_settle_delay() -> u64 {
    800
}

fn default_long_press() -> u64 {
    1000
}

/// Recovery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Consecutive steps without any executed action before the session
    /// ends with `no_actions_available`.
    #[serde(default = "default_max_empty_steps")]
    pub max_consecutive_empty_steps: u32,

    /// Wait before probing the device after a reconnect.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_consecutive_empty_steps: default_max_empty_steps(),
            reconnect_delay_ms: default_reconnect_delay(),
        }
    }
}

fn default_max_empty_steps() -> u32 {
    5
}

fn default_reconnect_delay() -> u64 {
    1000
}

/// Feature hook configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HooksConfig {
    /// Upper bound for each hook start/stop call.
    #[serde(default = "default_hook_timeout")]
    pub timeout_secs: u64,
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_hook_timeout(),
        }
    }
}

fn default_hook_timeout() -> u64 {
    10
}

/// Screenshot/overlay artifact configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    #[serde(default = "default_artifacts_dir")]
    pub dir: PathBuf,

    /// Write raw screenshots as `<dir>/<session>/step_<n>.png`.
    #[serde(default)]
    pub save_screenshots: bool,

    /// Write annotated overlays as `<dir>/<session>/step_<n>_overlay.png`.
    #[serde(default)]
    pub save_overlays: bool,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: default_artifacts_dir(),
            save_screenshots: false,
            save_overlays: false,
        }
    }
}

fn default_artifacts_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".visicrawl")
        .join("artifacts")
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily-rotated log files; console only when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    #[serde(default = "default_log_file_prefix")]
    pub file_prefix: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
            file_prefix: default_log_file_prefix(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file_prefix() -> String {
    "visicrawl".to_string()
}

/// Device connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device serial; the single attached device when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,

    #[serde(default = "default_adb_path")]
    pub adb_path: String,

    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            serial: None,
            adb_path: default_adb_path(),
            command_timeout_secs: default_command_timeout(),
        }
    }
}

fn default_adb_path() -> String {
    "adb".to_string()
}

fn default_command_timeout() -> u64 {
    15
}
