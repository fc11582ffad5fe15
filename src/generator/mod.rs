//! The generation collaborator.
//!
//! Heimdall treats model inference as an opaque, possibly slow, possibly
//! failing call behind the [`Generator`] trait. Two implementations ship
//! with the crate:
//!
//! - [`HttpGenerator`]: talks to an Ollama-compatible `/api/generate`
//!   endpoint over HTTP.
//! - [`RetryingGenerator`]: decorator adding exponential-backoff retry on
//!   transient failures to any generator.

pub mod http;
pub mod retry;

pub use http::HttpGenerator;
pub use retry::{RetryConfig, RetryingGenerator};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;
use crate::cache::Params;

/// Sampling parameters forwarded to the generator.
///
/// Unset fields are left to the generator's defaults and omitted from the
/// response-cache fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Maximum number of tokens to generate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature (0.0 to 2.0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    /// Nucleus sampling threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,

    /// Top-k sampling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
}

impl GenerationParams {
    /// Create empty params.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set max tokens.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set temperature.
    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set top-p.
    pub fn top_p(mut self, top_p: f64) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Set top-k.
    pub fn top_k(mut self, top_k: u32) -> Self {
        self.top_k = Some(top_k);
        self
    }

    /// The set parameters as a JSON map, for fingerprinting.
    pub fn to_params(&self) -> Params {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Params::new(),
        }
    }
}

/// An expensive text-generation backend.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Short backend name, used in logs and metrics.
    fn name(&self) -> &str;

    /// Generate a completion of `prompt` with `model`.
    async fn generate(&self, model: &str, prompt: &str, params: &GenerationParams)
    -> Result<String>;
}
