//! Feature hook management.
//!
//! Hooks start as independent tasks at session begin and are stopped and
//! collected at session end. Every failure, timeout or panic in a hook is
//! logged as a warning and otherwise ignored.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use visicrawl_protocols::{FeatureHook, FeatureKind};

/// Owns the session's feature hooks.
pub struct FeatureManager {
    hooks: Vec<Arc<dyn FeatureHook>>,
    timeout: Duration,
    starting: Vec<JoinHandle<()>>,
}

impl FeatureManager {
    pub fn new(timeout: Duration) -> Self {
        Self {
            hooks: Vec::new(),
            timeout,
            starting: Vec::new(),
        }
    }

    pub fn register(&mut self, hook: Arc<dyn FeatureHook>) {
        self.hooks.push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Start every hook in the background.
    ///
    /// Capture hooks get a stop first to clear state left by an earlier run.
    pub fn start_all(&mut self, session_id: &str, step: u32) {
        for hook in &self.hooks {
            let hook = Arc::clone(hook);
            let session_id = session_id.to_string();
            let limit = self.timeout;

            self.starting.push(tokio::spawn(async move {
                let name = hook.name().to_string();

                if hook.kind() == FeatureKind::Capture {
                    match timeout(limit, hook.stop_and_collect()).await {
                        Ok(Ok(_)) => debug!(feature = %name, "Precautionary stop done"),
                        Ok(Err(e)) => warn!(feature = %name, "Precautionary stop failed: {}", e),
                        Err(_) => warn!(feature = %name, "Precautionary stop timed out"),
                    }
                }

                match timeout(limit, hook.start(&session_id, step)).await {
                    Ok(Ok(())) => info!(feature = %name, "Feature started"),
                    Ok(Err(e)) => warn!(feature = %name, "Feature start failed: {}", e),
                    Err(_) => warn!(feature = %name, "Feature start timed out"),
                }
            }));
        }
    }

    /// Stop every hook and return the collected artifacts.
    pub async fn stop_all(&mut self) -> Vec<PathBuf> {
        for result in join_all(self.starting.drain(..)).await {
            if let Err(e) = result {
                warn!("Feature start task failed: {}", e);
            }
        }

        let stops: Vec<JoinHandle<Option<PathBuf>>> = self
            .hooks
            .iter()
            .map(|hook| {
                let hook = Arc::clone(hook);
                let limit = self.timeout;
                tokio::spawn(async move {
                    match timeout(limit, hook.stop_and_collect()).await {
                        Ok(Ok(artifact)) => artifact,
                        Ok(Err(e)) => {
                            warn!(feature = hook.name(), "Feature stop failed: {}", e);
                            None
                        }
                        Err(_) => {
                            warn!(feature = hook.name(), "Feature stop timed out");
                            None
                        }
                    }
                })
            })
            .collect();

        let mut artifacts = Vec::new();
        for result in join_all(stops).await {
            match result {
                Ok(Some(path)) => artifacts.push(path),
                Ok(None) => {}
                Err(e) => warn!("Feature stop task failed: {}", e),
            }
        }
        artifacts
    }
}
