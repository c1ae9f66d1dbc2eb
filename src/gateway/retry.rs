//! Bounded-attempt retry with pluggable backoff

use crate::config::{BackoffConfig, RetryConfig};
use crate::error::{GatewayError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Delay schedule between attempts
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// `base * attempt`
    Linear,
    /// `base * 2^(attempt - 1)`, capped at `max_delay`, optionally with ±25% jitter
    Exponential { max_delay: Duration, jitter: bool },
}

impl Backoff {
    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay(&self, base: Duration, attempt: u32) -> Duration {
        match *self {
            Backoff::Linear => base.saturating_mul(attempt),
            Backoff::Exponential { max_delay, jitter } => {
                let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
                let delay = base.saturating_mul(factor).min(max_delay);

                if jitter {
                    let spread = delay.as_millis() as f64 * 0.25 * (rand::random::<f64>() * 2.0 - 1.0);
                    let millis = (delay.as_millis() as f64 + spread).max(0.0) as u64;
                    Duration::from_millis(millis)
                } else {
                    delay
                }
            }
        }
    }
}

impl From<BackoffConfig> for Backoff {
    fn from(config: BackoffConfig) -> Self {
        match config {
            BackoffConfig::Linear => Backoff::Linear,
            BackoffConfig::Exponential { max_delay_ms, jitter } => Backoff::Exponential {
                max_delay: Duration::from_millis(max_delay_ms),
                jitter,
            },
        }
    }
}

/// Retry policy: how many attempts, and how long to wait between them
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            backoff: Backoff::Linear,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            backoff: config.backoff.into(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff: Backoff::Linear,
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Run `operation` until it succeeds, fails non-transiently, or attempts run out
    ///
    /// Non-transient errors are returned as-is after the first occurrence.
    /// Exhaustion yields [`GatewayError::ExhaustedRetries`] wrapping the last cause.
    pub async fn execute<F, Fut, T>(&self, label: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}", label, attempt);
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_transient() => {
                    error!("{} failed with non-retryable error: {}", label, e);
                    return Err(e);
                }
                Err(e) if attempt >= max_attempts => {
                    error!("{} failed after {} attempts: {}", label, attempt, e);
                    return Err(GatewayError::ExhaustedRetries {
                        attempts: attempt,
                        source: Box::new(e),
                    });
                }
                Err(e) => {
                    let delay = self.backoff.delay(self.base_delay, attempt);
                    warn!(
                        "{} failed on attempt {}/{}: {}; retrying in {:?}",
                        label, attempt, max_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Run `operation` with linear backoff: up to `max_retries` attempts, waiting `base_delay * attempt` between them
pub async fn with_retry<F, Fut, T>(operation: F, max_retries: u32, base_delay: Duration) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    RetryPolicy::new(max_retries, base_delay)
        .execute("operation", operation)
        .await
}
