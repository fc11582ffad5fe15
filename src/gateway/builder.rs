//! Builder for configuring gateway instances

use std::sync::Arc;
use std::time::Duration;

use super::Gateway;
use super::serving::Maintenance;
use crate::cache::{CacheConfig, ResponseCache, SessionConfig, SessionHistoryCache};
use crate::config::Config;
use crate::generator::{Generator, HttpGenerator, RetryConfig, RetryingGenerator};
use crate::limit::{RateLimitConfig, RateLimiter};
use crate::{HeimdallError, Result};

/// Default model name when none is configured.
pub const DEFAULT_MODEL: &str = "default";

/// Default maximum prompt length, in characters.
pub const DEFAULT_MAX_PROMPT_CHARS: usize = 4_000;

/// Main entry point for creating gateway instances.
pub struct Heimdall;

impl Heimdall {
    /// Create a new builder for configuring the gateway.
    pub fn builder() -> HeimdallBuilder {
        HeimdallBuilder::new()
    }

    /// Build a gateway from a loaded [`Config`], talking to the configured
    /// HTTP generator.
    pub fn from_config(config: &Config) -> Result<Gateway> {
        let generator = HttpGenerator::new(
            config.generator.base_url.clone(),
            Duration::from_secs(config.generator.timeout_secs),
        )?;
        Self::builder()
            .model(config.model.name.clone())
            .generator(generator)
            .retry(config.generator.retry_config())
            .response_cache(config.cache.to_cache_config())
            .session_cache(config.chat_history.to_session_config())
            .rate_limit(config.rate_limit.to_rate_limit_config())
            .max_prompt_chars(config.security.max_prompt_chars)
            .build()
    }
}

/// Builder for configuring gateway instances.
pub struct HeimdallBuilder {
    model: String,
    generator: Option<Arc<dyn Generator>>,
    retry: Option<RetryConfig>,
    response_cache: CacheConfig,
    session_cache: SessionConfig,
    rate_limit: RateLimitConfig,
    max_prompt_chars: usize,
}

impl HeimdallBuilder {
    pub fn new() -> Self {
        Self {
            model: DEFAULT_MODEL.to_owned(),
            generator: None,
            retry: None,
            response_cache: CacheConfig::default(),
            session_cache: SessionConfig::default(),
            rate_limit: RateLimitConfig::default(),
            max_prompt_chars: DEFAULT_MAX_PROMPT_CHARS,
        }
    }

    /// Set the model name passed to the generator.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the generation backend.
    pub fn generator(mut self, generator: impl Generator + 'static) -> Self {
        self.generator = Some(Arc::new(generator));
        self
    }

    /// Set a shared generation backend.
    pub fn shared_generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Retry transient generator failures with this policy.
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = Some(config);
        self
    }

    /// Configure the response cache.
    pub fn response_cache(mut self, config: CacheConfig) -> Self {
        self.response_cache = config;
        self
    }

    /// Configure the session history cache.
    pub fn session_cache(mut self, config: SessionConfig) -> Self {
        self.session_cache = config;
        self
    }

    /// Configure the rate limiter.
    pub fn rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit = config;
        self
    }

    /// Set the maximum prompt length, in characters. Chat prompts are
    /// measured after session history is prepended.
    pub fn max_prompt_chars(mut self, n: usize) -> Self {
        self.max_prompt_chars = n;
        self
    }

    /// Build the gateway.
    pub fn build(self) -> Result<Gateway> {
        let generator = self.generator.ok_or(HeimdallError::NoGenerator)?;
        if self.model.trim().is_empty() {
            return Err(HeimdallError::Configuration(
                "model name must not be empty".into(),
            ));
        }

        let generator: Arc<dyn Generator> = match self.retry {
            Some(config) if config.max_attempts > 1 => {
                Arc::new(RetryingGenerator::new(generator, config))
            }
            _ => generator,
        };

        let maintenance = Maintenance {
            response_sweep: self.response_cache.sweep_interval,
            session_sweep: self.session_cache.sweep_interval,
            bucket_idle_timeout: self.rate_limit.idle_timeout,
        };

        Ok(Gateway::new(
            self.model,
            generator,
            Arc::new(RateLimiter::new(&self.rate_limit)),
            Arc::new(ResponseCache::new(&self.response_cache)),
            Arc::new(SessionHistoryCache::new(&self.session_cache)),
            self.max_prompt_chars,
            maintenance,
        ))
    }
}

impl Default for HeimdallBuilder {
    fn default() -> Self {
        Self::new()
    }
}
