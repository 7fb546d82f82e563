//! Bounded retry for decision provider calls.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use visicrawl_config::DecisionConfig;
use visicrawl_protocols::ProviderError;

/// Retry policy for transport failures and timeouts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Add up to ±10% jitter to delays.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &DecisionConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_initial_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
            backoff_multiplier: config.retry_backoff_multiplier.max(1.0),
            jitter: config.retry_jitter,
        }
    }

    /// Policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Calculate delay for a given attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32);
        let delay = delay.min(self.max_delay.as_millis() as f64);

        let delay_ms = if self.jitter {
            (delay + rand_jitter(delay * 0.1)).max(0.0) as u64
        } else {
            delay as u64
        };

        Duration::from_millis(delay_ms)
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or the retries are used up. Returns the result and the attempt count.
    pub async fn run<F, Fut, T>(&self, mut operation: F) -> (Result<T, ProviderError>, u32)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return (Ok(value), attempt + 1),
                Err(e) => {
                    if !e.is_retryable() || attempt >= self.max_retries {
                        return (Err(e), attempt + 1);
                    }

                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        "Provider error (attempt {}/{}): {}, retrying in {:?}",
                        attempt + 1,
                        self.max_retries + 1,
                        e,
                        delay
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Simple jitter in `[-max, max)` using system time.
fn rand_jitter(max: f64) -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos as f64 / 1_000_000_000.0) * max * 2.0 - max
}
