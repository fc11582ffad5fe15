//! Per-key admission control.
//!
//! [`RateLimiter`] owns one [`TokenBucket`] per client key and creates it
//! the first time the key is seen, with `capacity = burst_size` and
//! `refill_rate = requests_per_minute / 60`.
//!
//! # Bucket growth
//!
//! Buckets are never removed on their own, so a stream of distinct keys
//! grows the map without bound. Hosts facing untrusted key spaces should
//! call [`RateLimiter::prune_idle`] periodically, or let
//! [`RateLimiter::spawn_pruner`] do it. Pruning only drops buckets that
//! would already be full again, so it never changes an admission decision.

pub mod bucket;

pub use bucket::TokenBucket;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::telemetry;

/// Configuration for the rate limiter.
///
/// ```rust
/// # use heimdall::RateLimitConfig;
/// let config = RateLimitConfig::new()
///     .requests_per_minute(120)
///     .burst_size(20);
/// ```
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Whether checks are enforced. Default: true.
    pub enabled: bool,
    /// Sustained refill rate, in requests per minute. Default: 60.
    pub requests_per_minute: u32,
    /// Bucket capacity, i.e. the largest instantaneous burst. Default: 10.
    pub burst_size: u32,
    /// If set, a background pruner drops buckets idle for this long.
    /// Default: none.
    pub idle_timeout: Option<Duration>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: 60,
            burst_size: 10,
            idle_timeout: None,
        }
    }
}

impl RateLimitConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// A config that admits everything.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Enable or disable enforcement.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the sustained rate.
    pub fn requests_per_minute(mut self, n: u32) -> Self {
        self.requests_per_minute = n;
        self
    }

    /// Set the burst size.
    pub fn burst_size(mut self, n: u32) -> Self {
        self.burst_size = n;
        self
    }

    /// Prune buckets idle for longer than `timeout`.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateDecision {
    pub allowed: bool,
    /// Advisory wait before the next request would be admitted. Zero when
    /// allowed.
    pub retry_after: Duration,
}

impl RateDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            retry_after: Duration::ZERO,
        }
    }

    /// `retry_after` in fractional seconds.
    pub fn retry_after_secs(&self) -> f64 {
        self.retry_after.as_secs_f64()
    }
}

/// Snapshot of rate limiter configuration and occupancy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateLimiterStats {
    pub enabled: bool,
    pub requests_per_minute: u32,
    pub burst_size: u32,
    pub tracked_keys: usize,
}

/// Token-bucket rate limiter keyed by client identity.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    enabled: bool,
    requests_per_minute: u32,
    burst_size: u32,
}

impl RateLimiter {
    /// Create a limiter from the given configuration.
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            enabled: config.enabled,
            requests_per_minute: config.requests_per_minute,
            burst_size: config.burst_size,
        }
    }

    /// Buckets are only mutated through `consume`, which leaves them
    /// consistent at every step.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, TokenBucket>> {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn refill_rate(&self) -> f64 {
        f64::from(self.requests_per_minute) / 60.0
    }

    /// Whether checks are enforced.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Decide whether one request from `key` is admitted.
    ///
    /// A disabled limiter admits everything without tracking the key.
    pub fn check(&self, key: &str) -> RateDecision {
        if !self.enabled {
            return RateDecision::allow();
        }
        let decision = {
            let mut buckets = self.lock();
            let bucket = buckets.entry(key.to_owned()).or_insert_with(|| {
                debug!(key, "creating rate limit bucket");
                TokenBucket::new(f64::from(self.burst_size), self.refill_rate())
            });
            if bucket.consume(1.0) {
                RateDecision::allow()
            } else {
                RateDecision {
                    allowed: false,
                    retry_after: bucket.wait_time(1.0),
                }
            }
        };

        if decision.allowed {
            metrics::counter!(telemetry::RATE_LIMIT_CHECKS_TOTAL, "outcome" => "allowed")
                .increment(1);
        } else {
            metrics::counter!(telemetry::RATE_LIMIT_CHECKS_TOTAL, "outcome" => "rejected")
                .increment(1);
            warn!(
                key,
                wait_secs = decision.retry_after_secs(),
                "rate limit exceeded"
            );
        }
        decision
    }

    /// Forget `key`, so its next check starts from a full bucket.
    ///
    /// Returns whether a bucket existed.
    pub fn clear(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no key is tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop buckets untouched for at least `max_idle` that would be full
    /// again by now. Returns how many were dropped.
    pub fn prune_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let mut buckets = self.lock();
        let before = buckets.len();
        buckets.retain(|_, bucket| {
            let idle = now.saturating_duration_since(bucket.last_refill());
            idle < max_idle || !bucket.is_full_at(now)
        });
        let pruned = before - buckets.len();
        if pruned > 0 {
            debug!(pruned, remaining = buckets.len(), "pruned idle rate limit buckets");
        }
        pruned
    }

    /// Current configuration and occupancy.
    pub fn stats(&self) -> RateLimiterStats {
        RateLimiterStats {
            enabled: self.enabled,
            requests_per_minute: self.requests_per_minute,
            burst_size: self.burst_size,
            tracked_keys: self.len(),
        }
    }

    /// Spawn a background task calling [`prune_idle`](Self::prune_idle)
    /// every `interval`.
    ///
    /// The task holds only a weak reference and exits once the limiter is
    /// dropped.
    ///
    /// # Panics
    ///
    /// Requires a tokio runtime context.
    pub fn spawn_pruner(self: &Arc<Self>, interval: Duration, max_idle: Duration) -> JoinHandle<()> {
        let limiter = Arc::downgrade(self);
        let period = interval.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let Some(limiter) = limiter.upgrade() else {
                    break;
                };
                limiter.prune_idle(max_idle);
            }
        })
    }
}

/// Choose the rate-limit key for a request: the API credential when one
/// was presented, otherwise the network origin.
pub fn admission_key<'a>(api_key: Option<&'a str>, origin: &'a str) -> &'a str {
    match api_key {
        Some(key) if !key.is_empty() => key,
        _ => origin,
    }
}
