//! Telemetry metric name constants.
//!
//! Centralised metric names for heimdall operations. Hosts install their
//! own `metrics` recorder (e.g. prometheus, statsd); without a recorder
//! installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `heimdall_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `cache`: which cache recorded the event ("response")
//! - `outcome`: admission result ("allowed" or "rejected")
//! - `status`: generation outcome ("ok" or "error")
//! - `operation`: serving path ("generate" or "chat")

/// Total response cache hits.
///
/// Labels: `cache`.
pub const CACHE_HITS_TOTAL: &str = "heimdall_cache_hits_total";

/// Total response cache misses.
///
/// Labels: `cache`.
pub const CACHE_MISSES_TOTAL: &str = "heimdall_cache_misses_total";

/// Total rate-limit checks.
///
/// Labels: `outcome` ("allowed" | "rejected").
pub const RATE_LIMIT_CHECKS_TOTAL: &str = "heimdall_rate_limit_checks_total";

/// Total turns appended to session histories.
pub const SESSION_MESSAGES_TOTAL: &str = "heimdall_session_messages_total";

/// Total generator invocations (cache misses that reached the model).
///
/// Labels: `operation`, `status` ("ok" | "error").
pub const GENERATIONS_TOTAL: &str = "heimdall_generations_total";

/// Generator call duration in seconds.
///
/// Labels: `operation`.
pub const GENERATION_DURATION_SECONDS: &str = "heimdall_generation_duration_seconds";

/// Total generator retry attempts (not counting the initial call).
pub const RETRIES_TOTAL: &str = "heimdall_retries_total";
