//! Mock adapters shared by the crawl scenarios.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::{GrayImage, ImageFormat, Luma};
use parking_lot::Mutex;

use visicrawl_config::CrawlConfig;
use visicrawl_core::CrawlControl;
use visicrawl_protocols::{
    BoundingBox, DecisionProvider, DetectionError, DeviceAdapter, DeviceError, FeatureHook,
    FeatureKind, ForegroundApp, Generation, Gesture, GestureOutcome, HookError, ProviderError,
    ProviderSettings, Screenshot, TextDetection, TextDetector,
};

pub const TARGET_APP: &str = "com.example.app";
pub const WIDTH: u32 = 128;
pub const HEIGHT: u32 = 256;

/// Config with a target, the given budgets and no app launch.
pub fn config(max_steps: Option<u32>, max_duration_secs: Option<u64>) -> CrawlConfig {
    let mut config = CrawlConfig::default();
    config.target.app_id = TARGET_APP.to_string();
    config.target.goal = "reach the settings screen".to_string();
    config.target.launch_on_start = false;
    config.budget.max_steps = max_steps;
    config.budget.max_duration_secs = max_duration_secs;
    config
}

/// PNG of 16px grey blocks drawn from `seed`. Different seeds give
/// fingerprints far apart; the same seed gives identical bytes.
pub fn screen_png(seed: u64) -> Vec<u8> {
    let mut state = seed.wrapping_add(1);
    let mut next = move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (state >> 56) as u8
    };

    let cols = (WIDTH / 16) as usize;
    let rows = (HEIGHT / 16) as usize;
    let blocks: Vec<u8> = (0..cols * rows).map(|_| next()).collect();

    let img = GrayImage::from_fn(WIDTH, HEIGHT, |x, y| {
        Luma([blocks[(y / 16) as usize * cols + (x / 16) as usize]])
    });
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// Device showing scripted screens.
///
/// Each capture takes the next entry of the plan; once the plan runs out
/// the last screen keeps being shown.
pub struct ScriptedDevice {
    plan: Mutex<VecDeque<Result<u64, DeviceError>>>,
    current: Mutex<u64>,
    foreground: Mutex<Option<ForegroundApp>>,
    navigates: AtomicBool,
    navigate_on: Mutex<Option<usize>>,
    reconnect_ok: AtomicBool,
    pub captures: AtomicU32,
    pub reconnects: AtomicU32,
    pub gestures: Mutex<Vec<Gesture>>,
    pub launches: Mutex<Vec<String>>,
}

impl ScriptedDevice {
    pub fn new() -> Self {
        Self {
            plan: Mutex::new(VecDeque::new()),
            current: Mutex::new(0),
            foreground: Mutex::new(Some(ForegroundApp::new(TARGET_APP).with_activity(".MainActivity"))),
            navigates: AtomicBool::new(false),
            navigate_on: Mutex::new(None),
            reconnect_ok: AtomicBool::new(true),
            captures: AtomicU32::new(0),
            reconnects: AtomicU32::new(0),
            gestures: Mutex::new(Vec::new()),
            launches: Mutex::new(Vec::new()),
        }
    }

    /// Screens to show, one per capture.
    pub fn with_screens(self, seeds: impl IntoIterator<Item = u64>) -> Self {
        self.plan.lock().extend(seeds.into_iter().map(Ok));
        self
    }

    /// Append an arbitrary capture result to the plan.
    pub fn then_capture(self, result: Result<u64, DeviceError>) -> Self {
        self.plan.lock().push_back(result);
        self
    }

    pub fn with_foreground(self, app: Option<ForegroundApp>) -> Self {
        *self.foreground.lock() = app;
        self
    }

    /// Every gesture reports navigation.
    pub fn navigating(self) -> Self {
        self.navigates.store(true, Ordering::SeqCst);
        self
    }

    /// Only the `n`th gesture (1-based) reports navigation.
    pub fn navigating_on(self, n: usize) -> Self {
        *self.navigate_on.lock() = Some(n);
        self
    }

    pub fn failing_reconnect(self) -> Self {
        self.reconnect_ok.store(false, Ordering::SeqCst);
        self
    }

    pub fn gesture_kinds(&self) -> Vec<visicrawl_protocols::ActionKind> {
        self.gestures.lock().iter().map(|g| g.kind).collect()
    }
}

#[async_trait]
impl DeviceAdapter for ScriptedDevice {
    fn id(&self) -> &str {
        "scripted-device"
    }

    async fn capture_screenshot(&self) -> Result<Screenshot, DeviceError> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        let seed = match self.plan.lock().pop_front() {
            Some(Ok(seed)) => {
                *self.current.lock() = seed;
                seed
            }
            Some(Err(e)) => return Err(e),
            None => *self.current.lock(),
        };
        Ok(Screenshot::new(screen_png(seed), WIDTH, HEIGHT))
    }

    async fn execute_gesture(&self, gesture: &Gesture) -> Result<GestureOutcome, DeviceError> {
        let count = {
            let mut gestures = self.gestures.lock();
            gestures.push(gesture.clone());
            gestures.len()
        };
        let navigated = self.navigates.load(Ordering::SeqCst) || *self.navigate_on.lock() == Some(count);
        Ok(GestureOutcome { navigated })
    }

    async fn foreground_app(&self) -> Result<Option<ForegroundApp>, DeviceError> {
        Ok(self.foreground.lock().clone())
    }

    async fn launch_app(&self, app_id: &str) -> Result<(), DeviceError> {
        self.launches.lock().push(app_id.to_string());
        Ok(())
    }

    async fn reconnect(&self) -> Result<(), DeviceError> {
        self.reconnects.fetch_add(1, Ordering::SeqCst);
        if self.reconnect_ok.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DeviceError::Unreachable("device not found".to_string()))
        }
    }
}

/// One scroll, which needs no label.
pub fn scroll_reply() -> String {
    r#"{"actions": [{"kind": "scroll_down", "rationale": "look further"}], "reasoning": "exploring"}"#
        .to_string()
}

/// Tap on the first grounded label.
pub fn tap_reply() -> String {
    r#"{"actions": [{"kind": "tap", "target": {"label": 1}, "rationale": "continue"}]}"#.to_string()
}

pub fn goal_reply() -> String {
    r#"{"actions": [{"kind": "back"}], "goal_completed": true, "reasoning": "settings reached"}"#
        .to_string()
}

/// Provider replaying scripted replies, then a fallback.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    fallback: String,
    delay: Duration,
    stop_on_call: Mutex<Option<(u32, CrawlControl)>>,
    fail_init: bool,
    pub calls: AtomicU32,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback: scroll_reply(),
            delay: Duration::ZERO,
            stop_on_call: Mutex::new(None),
            fail_init: false,
            calls: AtomicU32::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = fallback.into();
        self
    }

    /// Simulated model latency.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Request a stop while answering the `call`-th request.
    pub fn stopping_on(self, call: u32, control: CrawlControl) -> Self {
        *self.stop_on_call.lock() = Some((call, control));
        self
    }

    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }
}

#[async_trait]
impl DecisionProvider for ScriptedProvider {
    fn id(&self) -> &str {
        "scripted-provider"
    }

    async fn initialize(&self, _settings: &ProviderSettings) -> Result<(), ProviderError> {
        if self.fail_init {
            return Err(ProviderError::Authentication("invalid api key".to_string()));
        }
        Ok(())
    }

    async fn generate(&self, prompt: &str, _image: &Screenshot) -> Result<Generation, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.prompts.lock().push(prompt.to_string());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if let Some((stop_call, control)) = self.stop_on_call.lock().as_ref() {
            if *stop_call == call {
                control.stop();
            }
        }

        let reply = self.replies.lock().pop_front();
        match reply {
            Some(Ok(text)) => Ok(Generation::new(text).with_latency(25)),
            Some(Err(e)) => Err(e),
            None => Ok(Generation::new(self.fallback.clone()).with_latency(25)),
        }
    }
}

/// Detector finding one button.
pub struct StaticDetector;

#[async_trait]
impl TextDetector for StaticDetector {
    async fn detect(&self, _image: &Screenshot) -> Result<Vec<TextDetection>, DetectionError> {
        Ok(vec![TextDetection::new(
            "Continue",
            BoundingBox::new(10, 20, 60, 20),
            0.9,
        )])
    }
}

/// Capture hook producing a recording.
pub struct RecorderHook {
    pub artifact: PathBuf,
    pub started: AtomicBool,
}

impl RecorderHook {
    pub fn new(artifact: impl Into<PathBuf>) -> Self {
        Self {
            artifact: artifact.into(),
            started: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl FeatureHook for RecorderHook {
    fn name(&self) -> &str {
        "recorder"
    }

    fn kind(&self) -> FeatureKind {
        FeatureKind::Capture
    }

    async fn start(&self, _session_id: &str, _step: u32) -> Result<(), HookError> {
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop_and_collect(&self) -> Result<Option<PathBuf>, HookError> {
        if self.started.load(Ordering::SeqCst) {
            Ok(Some(self.artifact.clone()))
        } else {
            Ok(None)
        }
    }
}

pub fn arc<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
