//! Response and status types

use serde::{Deserialize, Serialize};

use super::Message;
use crate::cache::{ResponseCacheStats, SessionStats};
use crate::limit::RateLimiterStats;

/// Result of a generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub generated_text: String,
    pub prompt: String,
    pub model: String,
    /// Whitespace-separated word count of `generated_text`.
    pub tokens_generated: usize,
    /// Whether the text was served from the response cache.
    pub cached: bool,
}

/// Result of a chat request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: Message,
    pub model: String,
    /// Whitespace-separated word count of the reply.
    pub tokens_generated: usize,
    /// Whether the reply was served from the response cache.
    pub cached: bool,
}

/// Operational counters for a health/status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub version: &'static str,
    pub model: String,
    pub generator: String,
    pub response_cache: ResponseCacheStats,
    pub sessions: SessionStats,
    pub rate_limit: RateLimiterStats,
}

/// Word count used for `tokens_generated`.
pub(crate) fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
