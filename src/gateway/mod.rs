//! Retry, throttling and the invoker every service uses to reach the provider

pub mod invoker;
pub mod rate_limiter;
pub mod retry;

pub use invoker::{CallOptions, GatewayInvoker};
pub use rate_limiter::{RateLimitManager, RateLimitStats, RateLimitWindow};
pub use retry::{with_retry, Backoff, RetryPolicy};
