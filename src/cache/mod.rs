//! Caching subsystem.
//!
//! Three layers:
//!
//! - [`store::TimeIndexedCache`]: generic bounded, expiring key-value
//!   store. Both caches below are built on it.
//!
//! - [`response::ResponseCache`]: deduplicates identical generation
//!   requests within a TTL window, keyed on a request fingerprint. Tracks
//!   hit/miss counters.
//!
//! - [`session::SessionHistoryCache`]: short-lived ordered turn history
//!   per conversation session.

pub mod response;
pub mod session;
pub mod store;

pub use response::{CacheConfig, Params, ResponseCache, ResponseCacheStats};
pub use session::{Role, SessionConfig, SessionHistoryCache, SessionStats, Turn};
pub use store::TimeIndexedCache;
