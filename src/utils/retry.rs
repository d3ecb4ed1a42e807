//! Retry utilities with configurable backoff for upstream API calls.

use std::time::Duration;
use tokio::time::sleep;

use crate::config::RetrySettings;
use crate::sources::SourceError;

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts; `None` retries transient errors forever
    pub max_attempts: Option<u32>,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Multiplier applied per retry (1.0 = flat backoff)
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: Some(3),
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Retry transient errors forever with a flat delay
    pub fn unbounded_fixed(delay: Duration) -> Self {
        Self {
            max_attempts: None,
            initial_delay: delay,
            max_delay: delay,
            backoff_multiplier: 1.0,
        }
    }

    /// Never retry
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: Some(1),
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self
            .backoff_multiplier
            .max(1.0)
            .powi(retry.saturating_sub(1).min(i32::MAX as u32) as i32);
        let secs = (self.initial_delay.as_secs_f64() * factor).min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(secs.max(0.0))
    }

    fn exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        let initial_delay = Duration::from_millis(settings.backoff_ms);
        let multiplier = settings.backoff_multiplier.max(1.0);
        let max_delay = if multiplier > 1.0 {
            Duration::from_millis(settings.max_backoff_ms.max(settings.backoff_ms))
        } else {
            initial_delay
        };
        Self {
            max_attempts: settings.max_attempts.map(|n| n.max(1)),
            initial_delay,
            max_delay,
            backoff_multiplier: multiplier,
        }
    }
}

/// Execute an async operation, retrying while it fails with a transient error.
///
/// Non-transient errors are returned immediately. When the attempt budget is
/// exhausted the last transient error is returned.
pub async fn with_retry<T, F, Fut>(config: RetryConfig, operation: F) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, SourceError>>,
{
    let mut attempts: u32 = 0;
    let mut operation = operation;

    loop {
        attempts = attempts.saturating_add(1);

        match operation().await {
            Ok(result) => {
                if attempts > 1 {
                    tracing::info!(
                        "Operation succeeded on attempt {} after {} transient failures",
                        attempts,
                        attempts - 1
                    );
                }
                return Ok(result);
            }
            Err(error) if error.is_transient() => {
                if config.exhausted(attempts) {
                    tracing::warn!("Operation failed after {} attempts: {}", attempts, error);
                    return Err(error);
                }

                let delay = config.delay_for(attempts);
                tracing::debug!(
                    "Transient error on attempt {}: {}, retrying in {:?}",
                    attempts,
                    error,
                    delay
                );
                sleep(delay).await;
            }
            Err(error) => return Err(error),
        }
    }
}
