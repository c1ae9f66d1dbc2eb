//! Metrics collection and reporting for provider traffic

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Point-in-time view of gateway counters
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// Gateway calls completed (each may span several attempts)
    pub total_calls: u64,

    /// Provider attempts issued
    pub total_attempts: u64,

    /// Attempts beyond the first of each call
    pub total_retries: u64,

    /// Calls that ended in an error
    pub total_failures: u64,

    /// Times the rate limiter suspended the queue for a window slot
    pub rate_limit_waits: u64,

    pub prompt_tokens: u64,

    pub completion_tokens: u64,

    /// Average call duration (ms)
    pub avg_call_time_ms: f64,

    pub uptime_secs: u64,
}

/// Latency histogram buckets (in milliseconds)
const LATENCY_BUCKETS: &[f64] = &[50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 30000.0, 60000.0];

/// Histogram for tracking latency distribution
#[derive(Debug, Clone)]
pub struct Histogram {
    buckets: Vec<(f64, Arc<AtomicU64>)>,
    sum: Arc<AtomicU64>,
    count: Arc<AtomicU64>,
}

impl Histogram {
    fn new(buckets: &[f64]) -> Self {
        let bucket_counters = buckets
            .iter()
            .map(|&b| (b, Arc::new(AtomicU64::new(0))))
            .collect();

        Self {
            buckets: bucket_counters,
            sum: Arc::new(AtomicU64::new(0)),
            count: Arc::new(AtomicU64::new(0)),
        }
    }

    fn observe(&self, value: f64) {
        self.sum.fetch_add(value as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        // Cumulative buckets
        for (bucket, counter) in &self.buckets {
            if value <= *bucket {
                counter.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn export_prometheus(&self, name: &str, help: &str) -> String {
        let mut output = String::new();

        output.push_str(&format!("# HELP {} {}\n", name, help));
        output.push_str(&format!("# TYPE {} histogram\n", name));

        for (bucket, counter) in &self.buckets {
            let count = counter.load(Ordering::Relaxed);
            output.push_str(&format!("{}_bucket{{le=\"{}\"}} {}\n", name, bucket, count));
        }

        let total_count = self.count.load(Ordering::Relaxed);
        output.push_str(&format!("{}_bucket{{le=\"+Inf\"}} {}\n", name, total_count));

        let sum = self.sum.load(Ordering::Relaxed) as f64;
        output.push_str(&format!("{}_sum {:.3}\n", name, sum));
        output.push_str(&format!("{}_count {}\n", name, total_count));

        output
    }
}

/// Counters shared by the invoker, rate limiter and services
pub struct GatewayMetrics {
    start_time: Instant,
    total_calls: AtomicU64,
    total_attempts: AtomicU64,
    total_failures: AtomicU64,
    total_call_time_ms: AtomicU64,
    rate_limit_waits: AtomicU64,
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
    call_latency: Histogram,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            total_calls: AtomicU64::new(0),
            total_attempts: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
            total_call_time_ms: AtomicU64::new(0),
            rate_limit_waits: AtomicU64::new(0),
            prompt_tokens: AtomicU64::new(0),
            completion_tokens: AtomicU64::new(0),
            call_latency: Histogram::new(LATENCY_BUCKETS),
        }
    }

    /// Record one provider attempt
    pub fn record_attempt(&self) {
        self.total_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a finished gateway call, successful or not
    pub fn record_call(&self, duration: Duration, success: bool) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.total_failures.fetch_add(1, Ordering::Relaxed);
        }
        let ms = duration.as_millis() as u64;
        self.total_call_time_ms.fetch_add(ms, Ordering::Relaxed);
        self.call_latency.observe(ms as f64);
    }

    pub fn record_rate_limit_wait(&self) {
        self.rate_limit_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tokens(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total_calls = self.total_calls.load(Ordering::Relaxed);
        let total_attempts = self.total_attempts.load(Ordering::Relaxed);
        let total_call_time = self.total_call_time_ms.load(Ordering::Relaxed);

        let avg_call_time_ms = if total_calls > 0 {
            total_call_time as f64 / total_calls as f64
        } else {
            0.0
        };

        MetricsSnapshot {
            total_calls,
            total_attempts,
            total_retries: total_attempts.saturating_sub(total_calls),
            total_failures: self.total_failures.load(Ordering::Relaxed),
            rate_limit_waits: self.rate_limit_waits.load(Ordering::Relaxed),
            prompt_tokens: self.prompt_tokens.load(Ordering::Relaxed),
            completion_tokens: self.completion_tokens.load(Ordering::Relaxed),
            avg_call_time_ms,
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }

    /// Export metrics in Prometheus format
    pub fn export_prometheus(&self) -> String {
        let metrics = self.snapshot();

        let mut output = format!(
            "# HELP ai_gateway_calls_total Total gateway calls\n\
             # TYPE ai_gateway_calls_total counter\n\
             ai_gateway_calls_total {}\n\
             \n\
             # HELP ai_gateway_attempts_total Total provider attempts\n\
             # TYPE ai_gateway_attempts_total counter\n\
             ai_gateway_attempts_total {}\n\
             \n\
             # HELP ai_gateway_failures_total Gateway calls that ended in an error\n\
             # TYPE ai_gateway_failures_total counter\n\
             ai_gateway_failures_total {}\n\
             \n\
             # HELP ai_gateway_rate_limit_waits_total Rate limiter window waits\n\
             # TYPE ai_gateway_rate_limit_waits_total counter\n\
             ai_gateway_rate_limit_waits_total {}\n\
             \n\
             # HELP ai_gateway_tokens_total Tokens reported by the provider\n\
             # TYPE ai_gateway_tokens_total counter\n\
             ai_gateway_tokens_total{{kind=\"prompt\"}} {}\n\
             ai_gateway_tokens_total{{kind=\"completion\"}} {}\n\
             \n\
             # HELP ai_gateway_uptime_seconds Uptime in seconds\n\
             # TYPE ai_gateway_uptime_seconds counter\n\
             ai_gateway_uptime_seconds {}\n\
             \n",
            metrics.total_calls,
            metrics.total_attempts,
            metrics.total_failures,
            metrics.rate_limit_waits,
            metrics.prompt_tokens,
            metrics.completion_tokens,
            metrics.uptime_secs,
        );

        output.push_str(&self.call_latency.export_prometheus(
            "ai_gateway_call_duration_ms",
            "Gateway call duration in milliseconds"
        ));

        output
    }
}

impl Default for GatewayMetrics {
    fn default() -> Self {
        Self::new()
    }
}
