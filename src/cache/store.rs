//! Bounded, expiring key-value store shared by the response and session caches.
//!
//! [`TimeIndexedCache`] combines two retention rules:
//!
//! - **TTL**: every write stamps `expires_at = now + ttl`. Expiry is lazy:
//!   stale entries may linger in the map, but [`get`](TimeIndexedCache::get)
//!   removes them on touch and never returns them. [`size`](TimeIndexedCache::size)
//!   and the optional [sweeper](TimeIndexedCache::spawn_sweeper) purge them
//!   in bulk.
//! - **Capacity**: inserting a new key into a full cache first drops expired
//!   entries, then evicts the least-recently-touched live entry.
//!
//! A single mutex guards the whole map for the duration of each operation.
//! Every operation is bounded in-memory work, so coarse locking is cheap and
//! keeps per-key operations linearizable.
//!
//! Time is read from [`tokio::time::Instant`], which follows the paused test
//! clock under `#[tokio::test(start_paused = true)]` and is the std clock
//! everywhere else.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::trace;

/// Expiry used when `now + ttl` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 3600);

/// A stored value plus its retention metadata.
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
    accessed_at: Instant,
    /// Monotonic touch counter; breaks ties between equal `accessed_at`.
    touched: u64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

struct Inner<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    touches: u64,
}

impl<K: Eq + Hash + Clone, V> Inner<K, V> {
    fn next_touch(&mut self) -> u64 {
        self.touches += 1;
        self.touches
    }

    fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before - self.entries.len()
    }

    /// Remove the entry with the oldest `(accessed_at, touched)` pair.
    fn evict_one(&mut self) -> bool {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| (entry.accessed_at, entry.touched))
            .map(|(key, _)| key.clone());
        match victim {
            Some(key) => self.entries.remove(&key).is_some(),
            None => false,
        }
    }

    /// Replace or insert `key` as a whole entry.
    fn insert(&mut self, key: K, value: V, now: Instant, ttl: Duration, max_size: usize) {
        if !self.entries.contains_key(&key) && self.entries.len() >= max_size {
            let purged = self.purge_expired(now);
            while self.entries.len() >= max_size {
                if !self.evict_one() {
                    break;
                }
            }
            trace!(purged, "made room for new cache entry");
        }
        let touched = self.next_touch();
        let entry = CacheEntry {
            value,
            expires_at: now.checked_add(ttl).unwrap_or(now + FAR_FUTURE),
            accessed_at: now,
            touched,
        };
        self.entries.insert(key, entry);
    }
}

/// Generic bounded key-value store with per-entry TTL.
///
/// Thread-safe; share it behind an `Arc`.
///
/// # Boundaries
///
/// - `max_size == 0` disables retention: [`set`](Self::set) and
///   [`update`](Self::update) are no-ops and every lookup misses.
/// - `ttl == 0` keeps an entry visible only until the clock moves past the
///   instant it was written.
pub struct TimeIndexedCache<K, V> {
    inner: Mutex<Inner<K, V>>,
    ttl: Duration,
    max_size: usize,
}

impl<K, V> TimeIndexedCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create an empty cache.
    pub fn new(ttl: Duration, max_size: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                touches: 0,
            }),
            ttl,
            max_size,
        }
    }

    /// Entries are only ever replaced whole, so a map left behind by a
    /// panicking holder is still consistent.
    fn lock(&self) -> MutexGuard<'_, Inner<K, V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a live entry, refreshing its access time.
    ///
    /// An expired entry is removed and reported as a miss.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        let now = Instant::now();
        let mut inner = self.lock();
        if inner.entries.get(key)?.is_expired(now) {
            inner.entries.remove(key);
            return None;
        }
        let touched = inner.next_touch();
        let entry = inner.entries.get_mut(key)?;
        entry.accessed_at = now;
        entry.touched = touched;
        Some(entry.value.clone())
    }

    /// Insert or overwrite `key`.
    ///
    /// Overwriting never evicts and always restarts the TTL. Inserting a new
    /// key into a full cache evicts first.
    pub fn set(&self, key: K, value: V) {
        if self.max_size == 0 {
            return;
        }
        let now = Instant::now();
        self.lock().insert(key, value, now, self.ttl, self.max_size);
    }

    /// Atomically read-modify-write `key`.
    ///
    /// `f` receives the live value (or `None` if absent or expired) and
    /// returns the replacement, which is stored with a fresh TTL. The whole
    /// sequence runs under the map lock, so concurrent updates of the same
    /// key are serialized and none is lost.
    pub fn update<F>(&self, key: K, f: F)
    where
        F: FnOnce(Option<V>) -> V,
    {
        if self.max_size == 0 {
            return;
        }
        let now = Instant::now();
        let mut inner = self.lock();
        let current = match inner.entries.remove(&key) {
            Some(entry) if !entry.is_expired(now) => Some(entry.value),
            _ => None,
        };
        let value = f(current);
        inner.insert(key, value, now, self.ttl, self.max_size);
    }

    /// Remove `key`, returning its value if it was still live.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        self.lock()
            .entries
            .remove(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value)
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    /// Number of live entries. Expired entries are purged as a side effect.
    pub fn size(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.lock();
        inner.purge_expired(now);
        inner.entries.len()
    }

    /// Purge expired entries, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        self.lock().purge_expired(now)
    }

    /// Configured time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Configured maximum number of entries.
    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

impl<K, V> TimeIndexedCache<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + 'static,
{
    /// Spawn a background task that purges expired entries every `interval`.
    ///
    /// The task holds only a weak reference and exits once the cache is
    /// dropped. It is a memory-hygiene optimisation: lookups never return
    /// stale values whether or not it has run.
    ///
    /// # Panics
    ///
    /// Requires a tokio runtime context.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache = Arc::downgrade(self);
        let period = interval.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                let purged = cache.purge_expired();
                if purged > 0 {
                    trace!(purged, "swept expired cache entries");
                }
            }
        })
    }
}
