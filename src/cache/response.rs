//! Response cache for generated text.
//!
//! [`ResponseCache`] deduplicates identical generation requests within a TTL
//! window. Entries are keyed on a [fingerprint](ResponseCache::fingerprint)
//! of the request: a SHA-256 digest over the model name, the prompt and the
//! generation parameters with their keys sorted, so two requests that differ
//! only in parameter insertion order share one entry.
//!
//! # Architecture
//!
//! The serving core ([`Heimdall`](crate::Heimdall)) consults the cache after
//! admission and before calling the generator. A hit bypasses the generator
//! entirely; a miss is filled after a successful generation. Failed
//! generations are never cached.
//!
//! Hit and miss counters are kept on the cache itself (for
//! [`stats`](ResponseCache::stats)) and mirrored to `metrics` counters.
//!
//! # Fingerprint stability
//!
//! The fingerprint is a hex-encoded SHA-256 of canonical JSON, so it is
//! stable across processes and builds. Nested parameter objects are
//! canonicalised recursively.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::store::TimeIndexedCache;
use crate::telemetry;

/// Generation parameters as an order-insensitive JSON map.
pub type Params = Map<String, Value>;

/// Configuration for the response cache.
///
/// ```rust
/// # use heimdall::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_entries(10_000)
///     .ttl(Duration::from_secs(3600));
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Whether lookups and stores are performed at all. Default: true.
    pub enabled: bool,
    /// Maximum number of cached entries. Default: 100.
    pub max_entries: usize,
    /// Time-to-live for cached entries. Default: 1 hour.
    pub ttl: Duration,
    /// Period of the background expiry sweep, if any. Default: none.
    pub sweep_interval: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 100,
            ttl: Duration::from_secs(3600),
            sweep_interval: None,
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// A config whose cache never stores or returns anything.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Enable or disable the cache.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the maximum number of cached entries.
    pub fn max_entries(mut self, n: usize) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the time-to-live for cached entries.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Run a background sweep of expired entries every `interval`.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = Some(interval);
        self
    }
}

/// Snapshot of response cache counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseCacheStats {
    pub enabled: bool,
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    /// `hits / (hits + misses) * 100`, rounded to two decimals; `0.0` before
    /// any lookup.
    pub hit_rate_percent: f64,
}

/// In-memory cache of generated text keyed on request fingerprints.
pub struct ResponseCache {
    entries: Arc<TimeIndexedCache<String, String>>,
    enabled: bool,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResponseCache {
    /// Create a new response cache with the given configuration.
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: Arc::new(TimeIndexedCache::new(config.ttl, config.max_entries)),
            enabled: config.enabled,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Compute the cache key for `(model, prompt, params)`.
    pub fn fingerprint(model: &str, prompt: &str, params: &Params) -> String {
        let canonical = json!({
            "model": model,
            "params": canonicalize(&Value::Object(params.clone())),
            "prompt": prompt,
        });
        let digest = Sha256::digest(canonical.to_string().as_bytes());
        hex::encode(digest)
    }

    /// Whether the cache is administratively enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Look up a cached response.
    ///
    /// Returns `None` on miss. A disabled cache returns `None` without
    /// counting the lookup.
    pub fn get(&self, model: &str, prompt: &str, params: &Params) -> Option<String> {
        if !self.enabled {
            return None;
        }
        let key = Self::fingerprint(model, prompt, params);
        match self.entries.get(&key) {
            Some(response) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "cache" => "response").increment(1);
                debug!(key = &key[..16], "response cache hit");
                Some(response)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "cache" => "response")
                    .increment(1);
                debug!(key = &key[..16], "response cache miss");
                None
            }
        }
    }

    /// Store a response. No-op when disabled.
    pub fn set(&self, model: &str, prompt: &str, params: &Params, response: impl Into<String>) {
        if !self.enabled {
            return;
        }
        let key = Self::fingerprint(model, prompt, params);
        debug!(key = &key[..16], "caching response");
        self.entries.set(key, response.into());
    }

    /// Drop every entry and reset the hit/miss counters.
    pub fn clear(&self) {
        self.entries.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        info!("response cache cleared");
    }

    /// Current counters and occupancy.
    pub fn stats(&self) -> ResponseCacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        ResponseCacheStats {
            enabled: self.enabled,
            size: self.entries.size(),
            max_size: self.entries.max_size(),
            hits,
            misses,
            hit_rate_percent: hit_rate_percent(hits, misses),
        }
    }

    /// Spawn a background sweep of expired entries.
    ///
    /// # Panics
    ///
    /// Requires a tokio runtime context.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        self.entries.spawn_sweeper(interval)
    }
}

fn hit_rate_percent(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        return 0.0;
    }
    let rate = hits as f64 / total as f64 * 100.0;
    (rate * 100.0).round() / 100.0
}

/// Rebuild `value` with every object's keys in sorted order.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut fields: Vec<_> = map.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| (k.clone(), canonicalize(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(value: Value) -> Params {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn fingerprint_deterministic() {
        let p = params(json!({"temperature": 0.5}));
        let k1 = ResponseCache::fingerprint("model-a", "hello", &p);
        let k2 = ResponseCache::fingerprint("model-a", "hello", &p);
        assert_eq!(k1, k2);
        assert_eq!(k1.len(), 64);
    }

    #[test]
    fn fingerprint_differs_on_model() {
        let p = Params::new();
        let k1 = ResponseCache::fingerprint("model-a", "hello", &p);
        let k2 = ResponseCache::fingerprint("model-b", "hello", &p);
        assert_ne!(k1, k2);
    }

    #[test]
    fn fingerprint_differs_on_prompt() {
        let p = Params::new();
        let k1 = ResponseCache::fingerprint("model-a", "hello", &p);
        let k2 = ResponseCache::fingerprint("model-a", "world", &p);
        assert_ne!(k1, k2);
    }

    #[test]
    fn fingerprint_differs_on_param_value() {
        let k1 = ResponseCache::fingerprint("m", "p", &params(json!({"temperature": 0.1})));
        let k2 = ResponseCache::fingerprint("m", "p", &params(json!({"temperature": 0.2})));
        assert_ne!(k1, k2);
    }

    #[test]
    fn fingerprint_ignores_nested_key_order() {
        let mut inner_ab = Map::new();
        inner_ab.insert("a".into(), json!(1));
        inner_ab.insert("b".into(), json!(2));
        let mut inner_ba = Map::new();
        inner_ba.insert("b".into(), json!(2));
        inner_ba.insert("a".into(), json!(1));

        let mut p1 = Params::new();
        p1.insert("stop".into(), Value::Object(inner_ab));
        let mut p2 = Params::new();
        p2.insert("stop".into(), Value::Object(inner_ba));

        assert_eq!(
            ResponseCache::fingerprint("m", "p", &p1),
            ResponseCache::fingerprint("m", "p", &p2)
        );
    }

    #[test]
    fn hit_rate_without_traffic_is_zero() {
        assert_eq!(hit_rate_percent(0, 0), 0.0);
    }

    #[test]
    fn hit_rate_is_rounded_to_two_decimals() {
        assert_eq!(hit_rate_percent(1, 2), 33.33);
        assert_eq!(hit_rate_percent(3, 1), 75.0);
    }
}
