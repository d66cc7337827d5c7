//! Rate Limiting Infrastructure
//!
//! Sliding-window counters over fixed time buckets. Each key keeps the
//! count of the current bucket and the one before it; the effective count
//! weights the previous bucket by how much of it still overlaps the window
//! ending now. Storage backends only need to persist per-bucket counters.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;

/// Rate limit configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests allowed in the window
    pub max_requests: u32,
    /// Time window duration (also the bucket length)
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 30,
            window: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    pub fn window_ms(&self) -> i64 {
        (self.window.as_millis() as i64).max(1)
    }

    /// Start of the bucket containing `now_ms`
    pub fn bucket_start(&self, now_ms: i64) -> i64 {
        let window_ms = self.window_ms();
        now_ms.div_euclid(window_ms) * window_ms
    }
}

/// Rate limit check result
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at_ms: i64,
}

/// Weighted request count for the window ending at `now_ms`.
///
/// `previous` is the count of the bucket before the one starting at
/// `bucket_start_ms`; `current` already includes the request being checked.
pub fn sliding_window_count(
    previous: u32,
    current: u32,
    bucket_start_ms: i64,
    now_ms: i64,
    window_ms: i64,
) -> f64 {
    let elapsed = (now_ms - bucket_start_ms).clamp(0, window_ms) as f64;
    let overlap = 1.0 - elapsed / window_ms as f64;
    previous as f64 * overlap + current as f64
}

/// Turn bucket counters into a decision
pub fn evaluate(
    config: &RateLimitConfig,
    previous: u32,
    current: u32,
    now_ms: i64,
) -> RateLimitResult {
    let bucket_start = config.bucket_start(now_ms);
    let window_ms = config.window_ms();
    let count = sliding_window_count(previous, current, bucket_start, now_ms, window_ms);
    let max = config.max_requests as f64;
    RateLimitResult {
        allowed: count <= max,
        remaining: (max - count).max(0.0).floor() as u32,
        reset_at_ms: bucket_start + window_ms,
    }
}

/// Error raised by a rate-limit storage backend
#[derive(Debug, thiserror::Error)]
#[error("rate limit backend error: {0}")]
pub struct RateLimitError(#[source] pub Box<dyn std::error::Error + Send + Sync>);

/// Trait for rate limit storage backends
#[trait_variant::make(RateLimitStore: Send)]
pub trait LocalRateLimitStore {
    /// Record one request for `key` at `now_ms` and decide whether it is allowed.
    ///
    /// Rejected requests are counted too, so a client that keeps hammering
    /// stays limited.
    async fn check_and_increment(
        &self,
        key: &str,
        config: &RateLimitConfig,
        now_ms: i64,
    ) -> Result<RateLimitResult, RateLimitError>;
}

#[derive(Debug, Clone, Copy)]
struct Buckets {
    start_ms: i64,
    previous: u32,
    current: u32,
}

/// Process-local sliding-window limiter
#[derive(Debug, Default)]
pub struct InMemoryRateLimiter {
    buckets: Mutex<HashMap<String, Buckets>>,
}

impl InMemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop keys whose newest bucket is older than two windows
    pub async fn prune(&self, config: &RateLimitConfig, now_ms: i64) -> usize {
        let horizon = config.bucket_start(now_ms) - config.window_ms();
        let mut buckets = self.buckets.lock().await;
        let before = buckets.len();
        buckets.retain(|_, b| b.start_ms >= horizon);
        before - buckets.len()
    }
}

impl RateLimitStore for InMemoryRateLimiter {
    async fn check_and_increment(
        &self,
        key: &str,
        config: &RateLimitConfig,
        now_ms: i64,
    ) -> Result<RateLimitResult, RateLimitError> {
        let bucket_start = config.bucket_start(now_ms);
        let window_ms = config.window_ms();

        let mut buckets = self.buckets.lock().await;
        let entry = buckets.entry(key.to_string()).or_insert(Buckets {
            start_ms: bucket_start,
            previous: 0,
            current: 0,
        });

        if entry.start_ms != bucket_start {
            // Roll forward: the old current bucket only counts if it is adjacent
            entry.previous = if entry.start_ms == bucket_start - window_ms {
                entry.current
            } else {
                0
            };
            entry.current = 0;
            entry.start_ms = bucket_start;
        }
        entry.current = entry.current.saturating_add(1);

        Ok(evaluate(config, entry.previous, entry.current, now_ms))
    }
}
