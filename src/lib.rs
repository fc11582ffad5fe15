//! Heimdall - caching and admission control for LLM serving
//!
//! This crate sits in front of a text-generation backend and provides:
//!
//! - a [`ResponseCache`] that deduplicates identical generation requests
//!   within a TTL window,
//! - a [`SessionHistoryCache`] holding the recent turns of each chat session,
//! - a per-client token-bucket [`RateLimiter`],
//!
//! all built on the bounded, expiring [`TimeIndexedCache`]. The [`Gateway`]
//! wires them around a [`Generator`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use heimdall::{GenerateRequest, Heimdall, HttpGenerator, RateLimitConfig};
//!
//! #[tokio::main]
//! async fn main() -> heimdall::Result<()> {
//!     let gateway = Heimdall::builder()
//!         .model("llama3")
//!         .generator(HttpGenerator::new("http://localhost:11434", Duration::from_secs(60))?)
//!         .rate_limit(RateLimitConfig::new().requests_per_minute(30).burst_size(5))
//!         .build()?;
//!
//!     let response = gateway
//!         .generate("client-1", &GenerateRequest::new("What is the capital of France?"))
//!         .await?;
//!
//!     println!("{} (cached: {})", response.generated_text, response.cached);
//!     Ok(())
//! }
//! ```
//!
//! # Using the caches directly
//!
//! ```rust
//! use std::time::Duration;
//! use heimdall::{CacheConfig, Params, ResponseCache};
//!
//! let cache = ResponseCache::new(&CacheConfig::new().max_entries(10).ttl(Duration::from_secs(60)));
//! let params = Params::new();
//!
//! assert_eq!(cache.get("m", "hi", &params), None);
//! cache.set("m", "hi", &params, "hello");
//! assert_eq!(cache.get("m", "hi", &params).as_deref(), Some("hello"));
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod generator;
pub mod limit;
pub mod telemetry;
pub mod types;

// Re-export main types at crate root
pub use config::Config;
pub use error::{HeimdallError, Result};
pub use gateway::{Gateway, Heimdall, HeimdallBuilder, format_chat_prompt};

pub use cache::{
    CacheConfig, Params, ResponseCache, ResponseCacheStats, Role, SessionConfig,
    SessionHistoryCache, SessionStats, TimeIndexedCache, Turn,
};
pub use generator::{GenerationParams, Generator, HttpGenerator, RetryConfig, RetryingGenerator};
pub use limit::{
    RateDecision, RateLimitConfig, RateLimiter, RateLimiterStats, TokenBucket, admission_key,
};

pub use types::{ChatRequest, ChatResponse, GenerateRequest, GenerateResponse, HealthReport, Message};
