//! Tests for [`ResponseCache`]: fingerprinting, TTL, capacity and counters.

use std::time::Duration;

use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use serde_json::{Value, json};

use heimdall::cache::{CacheConfig, Params, ResponseCache};
use heimdall::telemetry;
use tokio::time::advance;

fn params(value: Value) -> Params {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn cache(max_entries: usize, ttl: Duration) -> ResponseCache {
    ResponseCache::new(&CacheConfig::new().max_entries(max_entries).ttl(ttl))
}

// =========================================================================
// CacheConfig
// =========================================================================

#[test]
fn cache_config_defaults() {
    let config = CacheConfig::default();
    assert!(config.enabled);
    assert_eq!(config.max_entries, 100);
    assert_eq!(config.ttl, Duration::from_secs(3600));
    assert_eq!(config.sweep_interval, None);
}

#[test]
fn cache_config_builder() {
    let config = CacheConfig::new()
        .max_entries(500)
        .ttl(Duration::from_secs(60))
        .sweep_interval(Duration::from_secs(30));
    assert_eq!(config.max_entries, 500);
    assert_eq!(config.ttl, Duration::from_secs(60));
    assert_eq!(config.sweep_interval, Some(Duration::from_secs(30)));
}

// =========================================================================
// Fingerprints
// =========================================================================

#[test]
fn fingerprint_ignores_param_order() {
    let mut p1 = Params::new();
    p1.insert("temperature".into(), json!(0.7));
    p1.insert("max_tokens".into(), json!(100));
    let mut p2 = Params::new();
    p2.insert("max_tokens".into(), json!(100));
    p2.insert("temperature".into(), json!(0.7));

    assert_eq!(
        ResponseCache::fingerprint("m", "hello", &p1),
        ResponseCache::fingerprint("m", "hello", &p2)
    );
}

#[test]
fn fingerprint_is_lowercase_hex_sha256() {
    let key = ResponseCache::fingerprint("m", "hello", &Params::new());
    assert_eq!(key.len(), 64);
    assert!(key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
}

#[test]
fn fingerprint_distinguishes_requests() {
    let empty = Params::new();
    let base = ResponseCache::fingerprint("m", "hello", &empty);
    assert_ne!(base, ResponseCache::fingerprint("m2", "hello", &empty));
    assert_ne!(base, ResponseCache::fingerprint("m", "hello!", &empty));
    assert_ne!(
        base,
        ResponseCache::fingerprint("m", "hello", &params(json!({"top_k": 40})))
    );
}

// =========================================================================
// Lookup behaviour
// =========================================================================

#[tokio::test(start_paused = true)]
async fn hit_then_expiry() {
    let cache = cache(2, Duration::from_secs(1));
    let empty = Params::new();

    cache.set("m", "hello", &empty, "world");
    assert_eq!(cache.get("m", "hello", &empty).as_deref(), Some("world"));
    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses), (1, 0));

    advance(Duration::from_millis(1100)).await;
    assert_eq!(cache.get("m", "hello", &empty), None);
    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses), (1, 1));
    assert_eq!(stats.size, 0);
}

#[tokio::test(start_paused = true)]
async fn param_order_shares_entry() {
    let cache = cache(10, Duration::from_secs(60));
    cache.set(
        "m",
        "p",
        &params(json!({"temperature": 0.2, "top_p": 0.9})),
        "cached",
    );

    let mut reordered = Params::new();
    reordered.insert("top_p".into(), json!(0.9));
    reordered.insert("temperature".into(), json!(0.2));
    assert_eq!(cache.get("m", "p", &reordered).as_deref(), Some("cached"));
}

#[tokio::test(start_paused = true)]
async fn capacity_evicts_least_recently_used() {
    let cache = cache(2, Duration::from_secs(60));
    let empty = Params::new();

    cache.set("m", "a", &empty, "A");
    cache.set("m", "b", &empty, "B");
    assert!(cache.get("m", "a", &empty).is_some());
    cache.set("m", "c", &empty, "C");

    assert_eq!(cache.get("m", "b", &empty), None);
    assert_eq!(cache.get("m", "a", &empty).as_deref(), Some("A"));
    assert_eq!(cache.get("m", "c", &empty).as_deref(), Some("C"));
    assert_eq!(cache.stats().size, 2);
}

#[tokio::test(start_paused = true)]
async fn disabled_cache_is_inert() {
    let cache = ResponseCache::new(&CacheConfig::disabled());
    let empty = Params::new();

    cache.set("m", "hello", &empty, "world");
    assert_eq!(cache.get("m", "hello", &empty), None);

    let stats = cache.stats();
    assert!(!stats.enabled);
    assert_eq!(stats.size, 0);
    assert_eq!((stats.hits, stats.misses), (0, 0));
}

#[tokio::test(start_paused = true)]
async fn clear_resets_entries_and_counters() {
    let cache = cache(10, Duration::from_secs(60));
    let empty = Params::new();
    cache.set("m", "hello", &empty, "world");
    cache.get("m", "hello", &empty);
    cache.get("m", "other", &empty);

    cache.clear();
    let stats = cache.stats();
    assert_eq!(stats.size, 0);
    assert_eq!((stats.hits, stats.misses), (0, 0));
    assert_eq!(stats.hit_rate_percent, 0.0);
}

#[tokio::test(start_paused = true)]
async fn stats_report_hit_rate() {
    let cache = cache(10, Duration::from_secs(60));
    let empty = Params::new();
    cache.set("m", "hello", &empty, "world");
    for _ in 0..3 {
        cache.get("m", "hello", &empty);
    }
    cache.get("m", "missing", &empty);

    let stats = cache.stats();
    assert_eq!(stats.max_size, 10);
    assert_eq!(stats.size, 1);
    assert_eq!(stats.hit_rate_percent, 75.0);
}

// =========================================================================
// Metrics
// =========================================================================

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

/// Sum all counter values matching a given metric name.
fn counter_total(snapshot: &SnapshotVec, name: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

#[test]
fn lookups_record_hit_and_miss_counters() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        let cache = cache(10, Duration::from_secs(60));
        let empty = Params::new();
        cache.get("m", "hello", &empty);
        cache.set("m", "hello", &empty, "world");
        cache.get("m", "hello", &empty);
        cache.get("m", "hello", &empty);
    });

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_HITS_TOTAL), 2);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL), 1);
}
