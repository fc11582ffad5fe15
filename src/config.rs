//! Configuration loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag) or an explicit path
//! 2. `~/.heimdall/config.toml` (user)
//! 3. `/etc/heimdall/config.toml` (system)
//!
//! Every section and key is optional; without any file the defaults apply.
//! After the file is read, `HEIMDALL_MODEL` and `HEIMDALL_GENERATOR_URL`
//! override `model.name` and `generator.base_url`.
//!
//! Configuration is read once at startup; there is no hot reload.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::cache::{CacheConfig, SessionConfig};
use crate::gateway::{DEFAULT_MAX_PROMPT_CHARS, DEFAULT_MODEL};
use crate::generator::RetryConfig;
use crate::generator::http::DEFAULT_BASE_URL;
use crate::limit::RateLimitConfig;
use crate::{HeimdallError, Result};

/// Environment variable overriding `model.name`.
pub const MODEL_ENV_VAR: &str = "HEIMDALL_MODEL";

/// Environment variable overriding `generator.base_url`.
pub const GENERATOR_URL_ENV_VAR: &str = "HEIMDALL_GENERATOR_URL";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelSection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub chat_history: ChatHistorySection,
    #[serde(default)]
    pub rate_limit: RateLimitSection,
    #[serde(default)]
    pub security: SecuritySection,
    #[serde(default)]
    pub generator: GeneratorSection,
}

/// Model selection.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelSection {
    /// Model name passed to the generator (default: "default").
    #[serde(default = "default_model")]
    pub name: String,
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            name: default_model(),
        }
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

/// Response cache settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Maximum cached responses (default: 100).
    #[serde(default = "default_cache_size")]
    pub max_entries: usize,
    /// Response TTL in seconds (default: 3600).
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
    /// Background expiry sweep period in seconds (default: off).
    #[serde(default)]
    pub sweep_interval_secs: Option<u64>,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: default_cache_size(),
            ttl_secs: default_cache_ttl(),
            sweep_interval_secs: None,
        }
    }
}

impl CacheSection {
    pub fn to_cache_config(&self) -> CacheConfig {
        let mut config = CacheConfig::new()
            .enabled(self.enabled)
            .max_entries(self.max_entries)
            .ttl(Duration::from_secs(self.ttl_secs));
        if let Some(secs) = self.sweep_interval_secs {
            config = config.sweep_interval(Duration::from_secs(secs));
        }
        config
    }
}

fn default_true() -> bool {
    true
}

fn default_cache_size() -> usize {
    100
}

fn default_cache_ttl() -> u64 {
    3600
}

/// Session history settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatHistorySection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Maximum tracked sessions (default: 1000).
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    /// Session idle TTL in seconds (default: 1800).
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,
    /// Background expiry sweep period in seconds (default: off).
    #[serde(default)]
    pub sweep_interval_secs: Option<u64>,
}

impl Default for ChatHistorySection {
    fn default() -> Self {
        Self {
            enabled: true,
            max_sessions: default_max_sessions(),
            ttl_secs: default_session_ttl(),
            sweep_interval_secs: None,
        }
    }
}

impl ChatHistorySection {
    pub fn to_session_config(&self) -> SessionConfig {
        let mut config = SessionConfig::new()
            .enabled(self.enabled)
            .max_sessions(self.max_sessions)
            .ttl(Duration::from_secs(self.ttl_secs));
        if let Some(secs) = self.sweep_interval_secs {
            config = config.sweep_interval(Duration::from_secs(secs));
        }
        config
    }
}

fn default_max_sessions() -> usize {
    1000
}

fn default_session_ttl() -> u64 {
    1800
}

/// Rate limiting settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Sustained rate (default: 60).
    #[serde(default = "default_rpm")]
    pub requests_per_minute: u32,
    /// Burst allowance (default: 10).
    #[serde(default = "default_burst")]
    pub burst_size: u32,
    /// Prune buckets idle for this many seconds (default: never).
    #[serde(default)]
    pub idle_timeout_secs: Option<u64>,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: default_rpm(),
            burst_size: default_burst(),
            idle_timeout_secs: None,
        }
    }
}

impl RateLimitSection {
    pub fn to_rate_limit_config(&self) -> RateLimitConfig {
        let mut config = RateLimitConfig::new()
            .enabled(self.enabled)
            .requests_per_minute(self.requests_per_minute)
            .burst_size(self.burst_size);
        if let Some(secs) = self.idle_timeout_secs {
            config = config.idle_timeout(Duration::from_secs(secs));
        }
        config
    }
}

fn default_rpm() -> u32 {
    60
}

fn default_burst() -> u32 {
    10
}

/// Request validation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SecuritySection {
    /// Maximum prompt length in characters (default: 4000).
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,
}

impl Default for SecuritySection {
    fn default() -> Self {
        Self {
            max_prompt_chars: default_max_prompt_chars(),
        }
    }
}

fn default_max_prompt_chars() -> usize {
    DEFAULT_MAX_PROMPT_CHARS
}

/// Generation backend settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorSection {
    /// Base URL of the Ollama-compatible server (default: http://localhost:11434).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds (default: 60).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Attempts per generation including the first (default: 3).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// First retry delay in milliseconds (default: 500).
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,
    /// Retry delay cap in milliseconds (default: 30000).
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

impl Default for GeneratorSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
        }
    }
}

impl GeneratorSection {
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new()
            .max_attempts(self.max_attempts)
            .initial_delay(Duration::from_millis(self.initial_delay_ms))
            .max_delay(Duration::from_millis(self.max_delay_ms))
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> u64 {
    500
}

fn default_max_delay() -> u64 {
    30_000
}

impl Config {
    /// Load configuration from the standard locations and apply environment
    /// overrides.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided; must exist)
    /// 2. `~/.heimdall/config.toml`
    /// 3. `/etc/heimdall/config.toml`
    /// 4. Built-in defaults
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path)?,
            None => {
                debug!("no config file found, using defaults");
                Self::default()
            }
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| HeimdallError::Configuration(format!("Failed to parse config: {e}")))
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            HeimdallError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            HeimdallError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    /// Resolve the config file path, if any.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(HeimdallError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".heimdall").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/heimdall/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    /// Apply overrides from `lookup` (the process environment in [`load`](Self::load)).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(model) = lookup(MODEL_ENV_VAR).filter(|v| !v.is_empty()) {
            self.model.name = model;
        }
        if let Some(url) = lookup(GENERATOR_URL_ENV_VAR).filter(|v| !v.is_empty()) {
            self.generator.base_url = url;
        }
    }
}
