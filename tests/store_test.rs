//! Tests for [`TimeIndexedCache`]: TTL expiry, capacity bounds and
//! least-recently-accessed eviction.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use heimdall::TimeIndexedCache;
use tokio::time::advance;

// =========================================================================
// Expiry
// =========================================================================

#[tokio::test(start_paused = true)]
async fn get_within_ttl_returns_value() {
    let cache = TimeIndexedCache::new(Duration::from_secs(1), 10);
    cache.set("a".to_string(), 1);

    advance(Duration::from_millis(500)).await;
    assert_eq!(cache.get("a"), Some(1));
}

#[tokio::test(start_paused = true)]
async fn get_after_ttl_misses_and_removes() {
    let cache = TimeIndexedCache::new(Duration::from_secs(1), 10);
    cache.set("a".to_string(), 1);

    advance(Duration::from_millis(1100)).await;
    assert_eq!(cache.get("a"), None);
    assert_eq!(cache.size(), 0);
}

#[tokio::test(start_paused = true)]
async fn reads_do_not_extend_ttl() {
    let cache = TimeIndexedCache::new(Duration::from_secs(2), 10);
    cache.set("a".to_string(), 1);

    advance(Duration::from_millis(1500)).await;
    assert_eq!(cache.get("a"), Some(1));

    advance(Duration::from_millis(1000)).await;
    assert_eq!(cache.get("a"), None);
}

#[tokio::test(start_paused = true)]
async fn overwrite_restarts_ttl() {
    let cache = TimeIndexedCache::new(Duration::from_secs(2), 10);
    cache.set("a".to_string(), 1);

    advance(Duration::from_millis(1500)).await;
    cache.set("a".to_string(), 2);

    advance(Duration::from_millis(1500)).await;
    assert_eq!(cache.get("a"), Some(2));
}

#[tokio::test(start_paused = true)]
async fn zero_ttl_expires_once_clock_moves() {
    let cache = TimeIndexedCache::new(Duration::ZERO, 10);
    cache.set("a".to_string(), 1);
    assert_eq!(cache.get("a"), Some(1));

    advance(Duration::from_millis(1)).await;
    assert_eq!(cache.get("a"), None);
}

#[tokio::test(start_paused = true)]
async fn size_purges_expired_entries() {
    let cache = TimeIndexedCache::new(Duration::from_secs(1), 10);
    cache.set("a".to_string(), 1);
    cache.set("b".to_string(), 2);
    advance(Duration::from_millis(600)).await;
    cache.set("c".to_string(), 3);

    assert_eq!(cache.size(), 3);
    advance(Duration::from_millis(600)).await;
    assert_eq!(cache.size(), 1);
}

#[tokio::test(start_paused = true)]
async fn purge_expired_reports_count() {
    let cache = TimeIndexedCache::new(Duration::from_secs(1), 10);
    cache.set("a".to_string(), 1);
    cache.set("b".to_string(), 2);
    advance(Duration::from_secs(2)).await;

    assert_eq!(cache.purge_expired(), 2);
    assert_eq!(cache.purge_expired(), 0);
}

// =========================================================================
// Capacity and eviction
// =========================================================================

#[tokio::test(start_paused = true)]
async fn evicts_least_recently_accessed() {
    let cache = TimeIndexedCache::new(Duration::from_secs(60), 3);
    cache.set("a".to_string(), 1);
    advance(Duration::from_millis(10)).await;
    cache.set("b".to_string(), 2);
    advance(Duration::from_millis(10)).await;
    cache.set("c".to_string(), 3);
    advance(Duration::from_millis(10)).await;

    // Touch "a" so "b" becomes the oldest.
    assert_eq!(cache.get("a"), Some(1));
    advance(Duration::from_millis(10)).await;

    cache.set("d".to_string(), 4);
    assert_eq!(cache.size(), 3);
    assert_eq!(cache.get("b"), None);
    assert_eq!(cache.get("a"), Some(1));
    assert_eq!(cache.get("c"), Some(3));
    assert_eq!(cache.get("d"), Some(4));
}

#[tokio::test(start_paused = true)]
async fn eviction_breaks_ties_by_access_order() {
    // Paused clock: every operation happens at the same instant.
    let cache = TimeIndexedCache::new(Duration::from_secs(60), 2);
    cache.set("a".to_string(), 1);
    cache.set("b".to_string(), 2);
    assert_eq!(cache.get("a"), Some(1));

    cache.set("c".to_string(), 3);
    assert_eq!(cache.get("b"), None);
    assert_eq!(cache.get("a"), Some(1));
    assert_eq!(cache.get("c"), Some(3));
}

#[tokio::test(start_paused = true)]
async fn size_never_exceeds_capacity() {
    let cache = TimeIndexedCache::new(Duration::from_secs(60), 5);
    for i in 0..50 {
        cache.set(format!("key-{i}"), i);
        assert!(cache.size() <= 5);
    }
    // The five most recent survive.
    for i in 45..50 {
        assert_eq!(cache.get(format!("key-{i}").as_str()), Some(i));
    }
}

#[tokio::test(start_paused = true)]
async fn zero_capacity_retains_nothing() {
    let cache = TimeIndexedCache::new(Duration::from_secs(60), 0);
    cache.set("a".to_string(), 1);
    cache.update("a".to_string(), |_| 2);

    assert_eq!(cache.get("a"), None);
    assert_eq!(cache.size(), 0);
}

#[tokio::test(start_paused = true)]
async fn clear_drops_everything() {
    let cache = TimeIndexedCache::new(Duration::from_secs(60), 10);
    cache.set("a".to_string(), 1);
    cache.set("b".to_string(), 2);
    cache.clear();

    assert_eq!(cache.size(), 0);
    assert_eq!(cache.get("a"), None);
}

// =========================================================================
// Update / remove
// =========================================================================

#[tokio::test(start_paused = true)]
async fn update_sees_current_value() {
    let cache = TimeIndexedCache::new(Duration::from_secs(60), 10);
    cache.update("n".to_string(), |v: Option<u32>| v.unwrap_or(0) + 1);
    cache.update("n".to_string(), |v: Option<u32>| v.unwrap_or(0) + 1);

    assert_eq!(cache.get("n"), Some(2));
}

#[tokio::test(start_paused = true)]
async fn remove_returns_live_value() {
    let cache = TimeIndexedCache::new(Duration::from_secs(60), 10);
    cache.set("a".to_string(), 1);

    assert_eq!(cache.remove("a"), Some(1));
    assert_eq!(cache.remove("a"), None);
}

// =========================================================================
// Concurrency
// =========================================================================

#[test]
fn concurrent_updates_are_not_lost() {
    let cache = Arc::new(TimeIndexedCache::new(Duration::from_secs(60), 10));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for _ in 0..100 {
                    cache.update("counter".to_string(), |v: Option<u64>| v.unwrap_or(0) + 1);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.get("counter"), Some(800));
}

#[test]
fn concurrent_inserts_respect_capacity() {
    let cache = Arc::new(TimeIndexedCache::new(Duration::from_secs(60), 16));
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..100 {
                    cache.set(format!("{t}-{i}"), i);
                    let _ = cache.get(format!("{t}-{}", i / 2).as_str());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert!(cache.size() <= 16);
}

// =========================================================================
// Background sweeper
// =========================================================================

#[tokio::test(start_paused = true)]
async fn sweeper_purges_in_background() {
    let cache = Arc::new(TimeIndexedCache::new(Duration::from_secs(1), 10));
    cache.set("a".to_string(), 1);
    let sweeper = cache.spawn_sweeper(Duration::from_secs(5));

    // Sleeping lets the paused clock auto-advance through the sweep tick.
    tokio::time::sleep(Duration::from_secs(6)).await;

    assert_eq!(cache.purge_expired(), 0);
    sweeper.abort();
}

#[tokio::test(start_paused = true)]
async fn sweeper_exits_when_cache_dropped() {
    let cache = Arc::new(TimeIndexedCache::<String, u32>::new(Duration::from_secs(1), 10));
    let sweeper = cache.spawn_sweeper(Duration::from_secs(1));
    drop(cache);

    advance(Duration::from_secs(2)).await;
    sweeper.await.unwrap();
}
