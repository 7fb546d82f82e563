//! Event delivery to observers.
//!
//! The orchestrator emits into a [`ChannelEventSink`], which never blocks.
//! An [`EventBridge`] drains that channel and forwards every event to each
//! [`EventObserver`] through the observer's own queue and task, so a slow
//! observer only delays itself.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use visicrawl_protocols::{CrawlEvent, EventSink};

/// Consumer of crawl events behind the bridge.
#[async_trait]
pub trait EventObserver: Send + Sync {
    fn name(&self) -> &str;

    async fn on_event(&self, event: &CrawlEvent);
}

/// Sink backed by an unbounded channel.
#[derive(Clone)]
pub struct ChannelEventSink {
    tx: mpsc::UnboundedSender<CrawlEvent>,
}

impl ChannelEventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<CrawlEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: CrawlEvent) {
        if self.tx.send(event).is_err() {
            trace!("Event channel closed, dropping event");
        }
    }
}

/// Fans events out to observers.
#[derive(Default)]
pub struct EventBridge {
    observers: Vec<Arc<dyn EventObserver>>,
}

impl EventBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_observer(mut self, observer: Arc<dyn EventObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Spawn the dispatcher and observer tasks.
    pub fn start(self) -> (ChannelEventSink, BridgeHandle) {
        let (sink, mut rx) = ChannelEventSink::channel();
        let shutdown = CancellationToken::new();

        let mut queues = Vec::with_capacity(self.observers.len());
        let mut tasks = Vec::with_capacity(self.observers.len() + 1);

        for observer in self.observers {
            let (tx, mut observer_rx) = mpsc::unbounded_channel::<CrawlEvent>();
            queues.push(tx);
            tasks.push(tokio::spawn(async move {
                while let Some(event) = observer_rx.recv().await {
                    observer.on_event(&event).await;
                }
                debug!(observer = observer.name(), "Event observer finished");
            }));
        }

        let token = shutdown.clone();
        tasks.push(tokio::spawn(async move {
            let forward = |event: CrawlEvent| {
                for queue in &queues {
                    if queue.send(event.clone()).is_err() {
                        warn!("Event observer queue closed");
                    }
                }
            };

            loop {
                tokio::select! {
                    biased;
                    event = rx.recv() => match event {
                        Some(event) => forward(event),
                        None => break,
                    },
                    _ = token.cancelled() => {
                        rx.close();
                        while let Some(event) = rx.recv().await {
                            forward(event);
                        }
                        break;
                    }
                }
            }
        }));

        (sink, BridgeHandle { shutdown, tasks })
    }
}

/// Running bridge.
pub struct BridgeHandle {
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl BridgeHandle {
    /// Deliver everything already emitted, then stop.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("Event bridge task failed: {}", e);
            }
        }
    }
}

/// Observer that writes events to the tracing subscriber.
#[derive(Debug, Default)]
pub struct TracingObserver;

#[async_trait]
impl EventObserver for TracingObserver {
    fn name(&self) -> &str {
        "tracing"
    }

    async fn on_event(&self, event: &CrawlEvent) {
        match event {
            CrawlEvent::SessionStarted { session_id, target_app, .. } => {
                info!(session = %session_id, target = %target_app, "Session started");
            }
            CrawlEvent::SessionCompleted { session_id, total_steps, reason, .. } => {
                info!(session = %session_id, total_steps, %reason, "Session completed");
            }
            CrawlEvent::RecoveryStarted { .. }
            | CrawlEvent::RecoveryExhausted { .. }
            | CrawlEvent::Error { .. } => {
                warn!(session = %event.session_id(), step = ?event.step(), event = event.name(), "{:?}", event);
            }
            _ => {
                debug!(session = %event.session_id(), step = ?event.step(), event = event.name(), "Crawl event");
            }
        }
    }
}

/// In-memory sink keeping every event.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<CrawlEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CrawlEvent> {
        self.events.lock().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(CrawlEvent::name).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events.lock().iter().filter(|e| e.name() == name).count()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: CrawlEvent) {
        self.events.lock().push(event);
    }
}

#[async_trait]
impl EventObserver for RecordingEventSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn on_event(&self, event: &CrawlEvent) {
        self.events.lock().push(event.clone());
    }
}
