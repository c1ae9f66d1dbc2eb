//! Single-flight FIFO throttle bounding provider requests per rolling window
//!
//! Callers hand operations to [`RateLimitManager::throttle`]; a dedicated
//! worker task drains the queue one operation at a time. Before each
//! operation the worker drops timestamps that have left the window, waits for
//! the oldest one to expire if the window is full, then records a timestamp
//! and runs the operation. The timestamp is recorded before the operation
//! resolves, so failed operations consume a slot too. Operations whose caller
//! has gone away by the time they reach the front are skipped without one.

use crate::config::RateLimitConfig;
use crate::error::{GatewayError, Result};
use crate::observability::GatewayMetrics;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info};

/// A queued operation and a handle on the caller waiting for it
struct Job {
    caller: Weak<()>,
    run: Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>,
}

impl Job {
    fn abandoned(&self) -> bool {
        self.caller.strong_count() == 0
    }
}

/// Execution timestamps within the trailing window, bounded by a cap
#[derive(Debug)]
pub struct RateLimitWindow {
    timestamps: VecDeque<Instant>,
    cap: usize,
    window: Duration,
}

impl RateLimitWindow {
    pub fn new(cap: usize, window: Duration) -> Self {
        Self {
            timestamps: VecDeque::with_capacity(cap),
            cap: cap.max(1),
            window,
        }
    }

    /// Drop timestamps that are at least one window old
    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.timestamps.front() {
            if now.duration_since(oldest) >= self.window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Claim a slot at `now`, or report when the oldest slot frees up
    fn try_acquire(&mut self, now: Instant) -> std::result::Result<(), Instant> {
        self.prune(now);

        if self.timestamps.len() >= self.cap {
            // Non-empty: cap is at least 1
            let oldest = self.timestamps[0];
            return Err(oldest + self.window);
        }

        self.timestamps.push_back(now);
        Ok(())
    }

    /// Timestamps still inside the window at `now`
    fn in_window(&self, now: Instant) -> usize {
        self.timestamps
            .iter()
            .filter(|&&t| now.duration_since(t) < self.window)
            .count()
    }
}

/// Throttle statistics
#[derive(Debug, Clone)]
pub struct RateLimitStats {
    pub in_window: usize,
    pub cap: usize,
    pub window: Duration,
    pub queued: usize,
}

/// Process-wide request throttle
///
/// Only the worker task mutates the window; the mutex exists so
/// [`stats`](Self::stats) can read it from other tasks.
pub struct RateLimitManager {
    sender: mpsc::UnboundedSender<Job>,
    window: Arc<Mutex<RateLimitWindow>>,
    queued: Arc<AtomicUsize>,
}

impl RateLimitManager {
    /// Create a throttle and spawn its worker
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::spawn(config, None)
    }

    /// Create a throttle that reports window waits to `metrics`
    pub fn with_metrics(config: &RateLimitConfig, metrics: Arc<GatewayMetrics>) -> Self {
        Self::spawn(config, Some(metrics))
    }

    fn spawn(config: &RateLimitConfig, metrics: Option<Arc<GatewayMetrics>>) -> Self {
        let window = Arc::new(Mutex::new(RateLimitWindow::new(
            config.requests_per_minute,
            config.window(),
        )));
        let queued = Arc::new(AtomicUsize::new(0));
        let (sender, receiver) = mpsc::unbounded_channel();

        tokio::spawn(run_worker(receiver, window.clone(), queued.clone(), metrics));

        info!(
            "Rate limiter started: {} requests per {:?}",
            config.requests_per_minute,
            config.window()
        );

        Self {
            sender,
            window,
            queued,
        }
    }

    /// Queue `operation` and wait for its outcome
    ///
    /// Operations run one at a time in submission order. Each caller receives
    /// only its own result; a failing operation does not affect the others.
    pub async fn throttle<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        // Dropped with this future, which marks the job abandoned
        let caller = Arc::new(());

        let job = Job {
            caller: Arc::downgrade(&caller),
            run: Box::new(move || {
                Box::pin(async move {
                    let _ = tx.send(operation().await);
                })
            }),
        };

        self.queued.fetch_add(1, Ordering::Relaxed);
        if self.sender.send(job).is_err() {
            self.queued.fetch_sub(1, Ordering::Relaxed);
            return Err(GatewayError::Internal("Rate limiter is not running".to_string()));
        }

        let outcome = rx.await.map_err(|_| {
            GatewayError::Internal("Throttled operation ended without a result".to_string())
        });
        drop(caller);
        outcome?
    }

    pub fn stats(&self) -> RateLimitStats {
        let window = self.window.lock();
        RateLimitStats {
            in_window: window.in_window(Instant::now()),
            cap: window.cap,
            window: window.window,
            queued: self.queued.load(Ordering::Relaxed),
        }
    }
}

async fn run_worker(
    mut receiver: mpsc::UnboundedReceiver<Job>,
    window: Arc<Mutex<RateLimitWindow>>,
    queued: Arc<AtomicUsize>,
    metrics: Option<Arc<GatewayMetrics>>,
) {
    'jobs: while let Some(job) = receiver.recv().await {
        loop {
            if job.abandoned() {
                queued.fetch_sub(1, Ordering::Relaxed);
                debug!("Skipping throttled operation; caller went away");
                continue 'jobs;
            }

            let acquired = window.lock().try_acquire(Instant::now());
            match acquired {
                Ok(()) => break,
                Err(free_at) => {
                    debug!(
                        "Rate limit window full; waiting {:?}",
                        free_at.saturating_duration_since(Instant::now())
                    );
                    if let Some(metrics) = &metrics {
                        metrics.record_rate_limit_wait();
                    }
                    tokio::time::sleep_until(free_at).await;
                }
            }
        }

        queued.fetch_sub(1, Ordering::Relaxed);

        // A panicking operation must not take the worker down with it
        if let Err(e) = tokio::spawn((job.run)()).await {
            error!("Throttled operation aborted: {}", e);
        }
    }

    debug!("Rate limiter worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(cap: usize) -> RateLimitConfig {
        RateLimitConfig {
            requests_per_minute: cap,
            window_secs: 60,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_third_request_waits_for_window() {
        let limiter = Arc::new(RateLimitManager::new(&config(2)));
        let started = Instant::now();
        let runs = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for i in 0..3 {
            let limiter = limiter.clone();
            let runs = runs.clone();
            handles.push(tokio::spawn(async move {
                limiter
                    .throttle(move || async move {
                        runs.fetch_add(1, Ordering::SeqCst);
                        Ok((i, Instant::now()))
                    })
                    .await
            }));
        }

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap().unwrap());
        }
        results.sort_by_key(|(_, ran_at)| *ran_at);

        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert!(results[0].1.duration_since(started) < Duration::from_secs(1));
        assert!(results[2].1.duration_since(results[0].1) >= Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let limiter = RateLimitManager::new(&config(100));
        let order = Arc::new(Mutex::new(Vec::new()));

        let futures = (0..5).map(|i| {
            let order = order.clone();
            limiter.throttle(move || async move {
                order.lock().push(i);
                Ok(())
            })
        });
        futures::future::try_join_all(futures).await.unwrap();

        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_failure_does_not_affect_others() {
        let limiter = RateLimitManager::new(&config(100));

        let failing = limiter.throttle(|| async {
            Err::<u32, _>(GatewayError::provider("boom", Some(500)))
        });
        let succeeding = limiter.throttle(|| async { Ok(7u32) });
        let (failed, succeeded) = tokio::join!(failing, succeeding);

        assert!(failed.is_err());
        assert_eq!(succeeded.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_failed_operation_consumes_slot() {
        let limiter = RateLimitManager::new(&config(5));

        let _ = limiter
            .throttle(|| async { Err::<(), _>(GatewayError::provider("boom", None)) })
            .await;

        assert_eq!(limiter.stats().in_window, 1);
    }

    #[tokio::test]
    async fn test_panicking_operation_is_isolated() {
        let limiter = RateLimitManager::new(&config(100));

        let panicked = limiter
            .throttle(|| async {
                if true {
                    panic!("operation blew up");
                }
                Ok(())
            })
            .await;
        assert!(matches!(panicked, Err(GatewayError::Internal(_))));

        assert_eq!(limiter.throttle(|| async { Ok(1) }).await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_caller_does_not_consume_slot() {
        let limiter = Arc::new(RateLimitManager::new(&config(1)));
        let started = Instant::now();

        limiter.throttle(|| async { Ok(()) }).await.unwrap();

        let waiting = {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.throttle(|| async { Ok(()) }).await })
        };
        tokio::task::yield_now().await;
        assert_eq!(limiter.stats().queued, 1);
        waiting.abort();
        assert!(waiting.await.unwrap_err().is_cancelled());

        let ran_at = limiter.throttle(|| async { Ok(Instant::now()) }).await.unwrap();

        assert!(ran_at.duration_since(started) < Duration::from_secs(61));
        assert_eq!(limiter.stats().in_window, 1);
        assert_eq!(limiter.stats().queued, 0);
    }

    #[test]
    fn test_window_prunes_old_timestamps() {
        let start = Instant::now();
        let mut window = RateLimitWindow::new(1, Duration::from_secs(60));

        assert!(window.try_acquire(start).is_ok());
        let free_at = window.try_acquire(start + Duration::from_secs(10)).unwrap_err();
        assert_eq!(free_at, start + Duration::from_secs(60));
        assert!(window.try_acquire(start + Duration::from_secs(60)).is_ok());
    }
}
