//! Tracing subscriber setup for embedders.

use std::path::Path;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use visicrawl_config::LoggingConfig;

type BoxedLayer = Box<dyn Layer<Layered<EnvFilter, Registry>> + Send + Sync>;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to create log appender: {0}")]
    Appender(String),

    #[error("Failed to install subscriber: {0}")]
    Init(String),
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `config.level`. With `config.dir` set, logs are also
/// written to daily-rotated files; keep the returned guard alive until exit
/// so buffered lines are flushed.
pub fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>, TelemetryError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let mut layers: Vec<BoxedLayer> = vec![console_layer(config.json)];

    let guard = match &config.dir {
        Some(dir) => {
            let (layer, guard) = file_layer(dir, &config.file_prefix, config.json)?;
            layers.push(layer);
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layers)
        .try_init()
        .map_err(|e| TelemetryError::Init(e.to_string()))?;

    Ok(guard)
}

fn console_layer(json: bool) -> BoxedLayer {
    if json {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer().with_target(true).with_ansi(true).boxed()
    }
}

fn file_layer(dir: &Path, prefix: &str, json: bool) -> Result<(BoxedLayer, WorkerGuard), TelemetryError> {
    std::fs::create_dir_all(dir)?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .max_log_files(30)
        .build(dir)
        .map_err(|e| TelemetryError::Appender(e.to_string()))?;

    let (writer, guard) = tracing_appender::non_blocking(appender);
    let layer = if json {
        fmt::layer().json().with_writer(writer).boxed()
    } else {
        fmt::layer().with_writer(writer).with_ansi(false).boxed()
    };
    Ok((layer, guard))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_once_with_file_output() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");
        let config = LoggingConfig {
            level: "debug".into(),
            dir: Some(log_dir.clone()),
            ..LoggingConfig::default()
        };

        let guard = init_tracing(&config).unwrap();
        assert!(guard.is_some());
        assert!(log_dir.is_dir());

        // A second global subscriber is refused rather than panicking.
        let err = init_tracing(&LoggingConfig::default()).unwrap_err();
        assert!(matches!(err, TelemetryError::Init(_)));
    }

    #[test]
    fn test_error_display() {
        let err = TelemetryError::Appender("bad prefix".into());
        assert_eq!(err.to_string(), "Failed to create log appender: bad prefix");
    }
}
