//! Inbound request types

use serde::{Deserialize, Serialize};

use super::Message;
use crate::generator::GenerationParams;

/// Single-shot text generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(flatten)]
    pub params: GenerationParams,
}

impl GenerateRequest {
    /// Create a request with default sampling parameters.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            params: GenerationParams::default(),
        }
    }

    /// Set sampling parameters.
    pub fn params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }
}

/// Multi-turn chat request.
///
/// With a `session_id`, prior turns of that session are prepended to
/// `messages`, and `messages` plus the reply are appended to the session
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(flatten)]
    pub params: GenerationParams,
}

impl ChatRequest {
    /// Create a stateless chat request.
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            session_id: None,
            params: GenerationParams::default(),
        }
    }

    /// Attach the request to a session.
    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Set sampling parameters.
    pub fn params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }
}
