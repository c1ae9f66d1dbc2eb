//! Single entry point for provider calls: retry, then optionally throttle

use super::{RateLimitManager, RetryPolicy};
use crate::error::Result;
use crate::observability::GatewayMetrics;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

/// Per-call overrides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallOptions {
    /// Attempt budget; `None` uses the invoker's policy
    pub retries: Option<u32>,

    /// Route the call through the shared rate limiter
    pub rate_limited: bool,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            retries: None,
            rate_limited: true,
        }
    }
}

impl CallOptions {
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn unthrottled(mut self) -> Self {
        self.rate_limited = false;
        self
    }
}

/// Wraps provider operations in the retry policy and the shared throttle
///
/// The retry loop runs inside the throttled operation, so a call occupies
/// one window slot no matter how many attempts it takes.
pub struct GatewayInvoker {
    retry: RetryPolicy,
    limiter: Arc<RateLimitManager>,
    metrics: Option<Arc<GatewayMetrics>>,
}

impl GatewayInvoker {
    pub fn new(retry: RetryPolicy, limiter: Arc<RateLimitManager>) -> Self {
        Self {
            retry,
            limiter,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<GatewayMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimitManager> {
        &self.limiter
    }

    pub fn metrics(&self) -> Option<&Arc<GatewayMetrics>> {
        self.metrics.as_ref()
    }

    /// Run `operation` under the retry policy and, unless disabled, the throttle
    pub async fn call<F, Fut, T>(&self, label: &'static str, operation: F, options: CallOptions) -> Result<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let policy = match options.retries {
            Some(retries) => self.retry.with_max_attempts(retries),
            None => self.retry,
        };
        let metrics = self.metrics.clone();
        let span = info_span!("gateway_call", operation = label, request_id = %Uuid::new_v4());

        let retried = async move {
            let started = Instant::now();
            let result = policy
                .execute(label, || {
                    if let Some(metrics) = &metrics {
                        metrics.record_attempt();
                    }
                    operation()
                })
                .await;

            debug!("{} finished in {:?}", label, started.elapsed());
            if let Some(metrics) = &metrics {
                metrics.record_call(started.elapsed(), result.is_ok());
            }
            result
        }
        .instrument(span);

        if options.rate_limited {
            self.limiter.throttle(move || retried).await
        } else {
            retried.await
        }
    }
}
