//! Per-session conversation history.
//!
//! [`SessionHistoryCache`] keeps an ordered list of [`Turn`]s per session id
//! so a chat handler can rebuild the full conversation before formatting a
//! prompt. Sessions share the TTL and capacity discipline of
//! [`TimeIndexedCache`]: an idle session disappears once its TTL elapses,
//! and every write restarts it.
//!
//! Appends go through [`TimeIndexedCache::update`], which runs the whole
//! read-append-write under the map lock. Concurrent appends to the same
//! session are therefore serialized and never lost.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::store::TimeIndexedCache;
use crate::telemetry;
use crate::{HeimdallError, Result};

/// Role of a conversation participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = HeimdallError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(HeimdallError::InvalidInput(format!("unknown role: {other}"))),
        }
    }
}

/// One message in a session history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    /// When the turn was recorded. Always set on turns read back from the
    /// cache.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<SystemTime>,
}

impl Turn {
    /// Create an untimestamped turn.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: None,
        }
    }

    /// Create a system turn
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user turn
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant turn
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Set an explicit timestamp.
    pub fn with_timestamp(mut self, timestamp: SystemTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Configuration for the session history cache.
///
/// ```rust
/// # use heimdall::SessionConfig;
/// # use std::time::Duration;
/// let config = SessionConfig::new()
///     .max_sessions(500)
///     .ttl(Duration::from_secs(600));
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Whether histories are recorded at all. Default: true.
    pub enabled: bool,
    /// Maximum number of concurrently tracked sessions. Default: 1,000.
    pub max_sessions: usize,
    /// Idle time after which a session is forgotten. Default: 30 minutes.
    pub ttl: Duration,
    /// Period of the background expiry sweep, if any. Default: none.
    pub sweep_interval: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_sessions: 1_000,
            ttl: Duration::from_secs(1800),
            sweep_interval: None,
        }
    }
}

impl SessionConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// A config that records nothing.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Enable or disable history recording.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the maximum number of tracked sessions.
    pub fn max_sessions(mut self, n: usize) -> Self {
        self.max_sessions = n;
        self
    }

    /// Set the session idle TTL.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Run a background sweep of expired sessions every `interval`.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = Some(interval);
        self
    }
}

/// Snapshot of session cache occupancy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStats {
    pub enabled: bool,
    pub active_sessions: usize,
    pub max_sessions: usize,
    pub ttl_seconds: u64,
}

/// TTL-bounded store of ordered conversation turns per session.
pub struct SessionHistoryCache {
    sessions: Arc<TimeIndexedCache<String, Vec<Turn>>>,
    enabled: bool,
}

impl SessionHistoryCache {
    /// Create a session cache from the given configuration.
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            sessions: Arc::new(TimeIndexedCache::new(config.ttl, config.max_sessions)),
            enabled: config.enabled,
        }
    }

    /// Whether history recording is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Turns recorded for `session_id`, oldest first.
    ///
    /// Empty when disabled, when `session_id` is empty, or on a miss.
    pub fn get_history(&self, session_id: &str) -> Vec<Turn> {
        if !self.enabled || session_id.is_empty() {
            return Vec::new();
        }
        let history = self.sessions.get(session_id).unwrap_or_default();
        debug!(session_id, turns = history.len(), "retrieved session history");
        history
    }

    /// Append a turn stamped with the current time.
    ///
    /// Timestamps within a session never go backwards: if the wall clock
    /// steps back, the new turn reuses the previous turn's timestamp.
    pub fn add_message(&self, session_id: &str, role: Role, content: impl Into<String>) {
        if !self.enabled || session_id.is_empty() {
            return;
        }
        let content = content.into();
        self.sessions.update(session_id.to_owned(), |history| {
            let mut history = history.unwrap_or_default();
            let now = SystemTime::now();
            let timestamp = history
                .last()
                .and_then(|turn| turn.timestamp)
                .map_or(now, |last| last.max(now));
            history.push(Turn {
                role,
                content,
                timestamp: Some(timestamp),
            });
            history
        });
        metrics::counter!(telemetry::SESSION_MESSAGES_TOTAL).increment(1);
        debug!(session_id, %role, "added message to session");
    }

    /// Replace the whole history of `session_id`.
    ///
    /// Turns without a timestamp are stamped with the current time.
    pub fn update_history(&self, session_id: &str, turns: Vec<Turn>) {
        if !self.enabled || session_id.is_empty() {
            return;
        }
        let now = SystemTime::now();
        let turns: Vec<Turn> = turns
            .into_iter()
            .map(|mut turn| {
                turn.timestamp.get_or_insert(now);
                turn
            })
            .collect();
        debug!(session_id, turns = turns.len(), "replaced session history");
        self.sessions.set(session_id.to_owned(), turns);
    }

    /// Forget `session_id` regardless of its TTL.
    ///
    /// Returns whether a live session was removed.
    pub fn clear_session(&self, session_id: &str) -> bool {
        let removed = self.sessions.remove(session_id).is_some();
        if removed {
            info!(session_id, "cleared session");
        }
        removed
    }

    /// Current occupancy and configuration.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            enabled: self.enabled,
            active_sessions: self.sessions.size(),
            max_sessions: self.sessions.max_size(),
            ttl_seconds: self.sessions.ttl().as_secs(),
        }
    }

    /// Spawn a background sweep of expired sessions.
    ///
    /// # Panics
    ///
    /// Requires a tokio runtime context.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        self.sessions.spawn_sweeper(interval)
    }
}
