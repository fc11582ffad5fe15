//! Gateway - admission control and caching in front of a generator

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, instrument};

use crate::cache::{Params, ResponseCache, Role, SessionHistoryCache};
use crate::generator::{GenerationParams, Generator};
use crate::limit::RateLimiter;
use crate::telemetry;
use crate::types::{
    ChatRequest, ChatResponse, GenerateRequest, GenerateResponse, HealthReport, Message,
    word_count,
};
use crate::{HeimdallError, Result};

/// Periodic maintenance configured at build time.
#[derive(Debug, Clone, Default)]
pub(crate) struct Maintenance {
    pub response_sweep: Option<Duration>,
    pub session_sweep: Option<Duration>,
    pub bucket_idle_timeout: Option<Duration>,
}

/// Serving core: one instance per process, shared by every request handler.
///
/// Every request goes through the same pipeline:
///
/// 1. admission via the [`RateLimiter`], keyed by the caller-chosen client key;
/// 2. for chat, prior session turns are prepended to the request;
/// 3. lookup in the [`ResponseCache`] by request fingerprint;
/// 4. on miss, the [`Generator`] call, whose result is cached;
/// 5. for chat, the new turns are appended to the session.
pub struct Gateway {
    model: String,
    generator: Arc<dyn Generator>,
    limiter: Arc<RateLimiter>,
    responses: Arc<ResponseCache>,
    sessions: Arc<SessionHistoryCache>,
    max_prompt_chars: usize,
    maintenance: Maintenance,
}

impl Gateway {
    pub(crate) fn new(
        model: String,
        generator: Arc<dyn Generator>,
        limiter: Arc<RateLimiter>,
        responses: Arc<ResponseCache>,
        sessions: Arc<SessionHistoryCache>,
        max_prompt_chars: usize,
        maintenance: Maintenance,
    ) -> Self {
        Self {
            model,
            generator,
            limiter,
            responses,
            sessions,
            max_prompt_chars,
            maintenance,
        }
    }

    /// Model name sent to the generator and used in fingerprints.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The rate limiter.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// The response cache.
    pub fn response_cache(&self) -> &Arc<ResponseCache> {
        &self.responses
    }

    /// The session history cache.
    pub fn sessions(&self) -> &Arc<SessionHistoryCache> {
        &self.sessions
    }

    /// Reject the request if `client_key` is over its rate limit.
    pub fn admit(&self, client_key: &str) -> Result<()> {
        let decision = self.limiter.check(client_key);
        if decision.allowed {
            Ok(())
        } else {
            Err(HeimdallError::RateLimited {
                retry_after: decision.retry_after,
            })
        }
    }

    fn validate_prompt(&self, prompt: &str) -> Result<()> {
        if prompt.trim().is_empty() {
            return Err(HeimdallError::InvalidInput("prompt must not be empty".into()));
        }
        let length = prompt.chars().count();
        if length > self.max_prompt_chars {
            return Err(HeimdallError::PromptTooLong {
                length,
                limit: self.max_prompt_chars,
            });
        }
        Ok(())
    }

    /// Call the generator, recording metrics. Output is trimmed; errors are
    /// returned as the generator reported them.
    async fn call_generator(
        &self,
        operation: &'static str,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String> {
        let started = Instant::now();
        let result = self.generator.generate(&self.model, prompt, params).await;
        metrics::histogram!(telemetry::GENERATION_DURATION_SECONDS, "operation" => operation)
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok(text) => {
                metrics::counter!(telemetry::GENERATIONS_TOTAL,
                    "operation" => operation, "status" => "ok")
                .increment(1);
                Ok(text.trim().to_owned())
            }
            Err(e) => {
                metrics::counter!(telemetry::GENERATIONS_TOTAL,
                    "operation" => operation, "status" => "error")
                .increment(1);
                error!(operation, generator = self.generator.name(), error = %e, "generation failed");
                Err(e)
            }
        }
    }

    /// Look up the response cache, falling back to the generator.
    ///
    /// Returns the text and whether it came from the cache.
    async fn cached_generate(
        &self,
        operation: &'static str,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<(String, bool)> {
        let fingerprint_params: Params = params.to_params();
        if let Some(text) = self.responses.get(&self.model, prompt, &fingerprint_params) {
            info!(operation, "serving response from cache");
            return Ok((text, true));
        }

        let text = self.call_generator(operation, prompt, params).await?;
        self.responses
            .set(&self.model, prompt, &fingerprint_params, text.clone());
        info!(operation, chars = text.len(), "generated response");
        Ok((text, false))
    }

    /// Serve a single-shot generation request for `client_key`.
    #[instrument(skip_all, fields(model = %self.model))]
    pub async fn generate(
        &self,
        client_key: &str,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse> {
        self.admit(client_key)?;
        self.validate_prompt(&request.prompt)?;

        let (generated_text, cached) = self
            .cached_generate("generate", &request.prompt, &request.params)
            .await?;

        Ok(GenerateResponse {
            tokens_generated: word_count(&generated_text),
            generated_text,
            prompt: request.prompt.clone(),
            model: self.model.clone(),
            cached,
        })
    }

    /// Serve a chat request for `client_key`.
    ///
    /// With a session id, the session's history is prepended before the
    /// prompt is built, and after a reply (generated or cached) the request
    /// messages and the reply are appended to the session in order. Failed
    /// generations leave the session untouched.
    #[instrument(skip_all, fields(model = %self.model, session = request.session_id.as_deref()))]
    pub async fn chat(&self, client_key: &str, request: &ChatRequest) -> Result<ChatResponse> {
        self.admit(client_key)?;

        if request.messages.is_empty() {
            return Err(HeimdallError::InvalidInput("messages must not be empty".into()));
        }
        if !request.messages.iter().any(|m| m.role == Role::User) {
            return Err(HeimdallError::InvalidInput(
                "messages must contain a user message".into(),
            ));
        }

        let session_id = request.session_id.as_deref().filter(|id| !id.is_empty());
        let mut conversation: Vec<Message> = match session_id {
            Some(id) => {
                let history = self.sessions.get_history(id);
                info!(session_id = id, turns = history.len(), "loaded session history");
                history.into_iter().map(Message::from).collect()
            }
            None => Vec::new(),
        };
        conversation.extend(request.messages.iter().cloned());

        let prompt = format_chat_prompt(&conversation);
        self.validate_prompt(&prompt)?;

        let (reply, cached) = self.cached_generate("chat", &prompt, &request.params).await?;

        if let Some(id) = session_id {
            for message in &request.messages {
                self.sessions
                    .add_message(id, message.role, message.content.clone());
            }
            self.sessions.add_message(id, Role::Assistant, reply.clone());
        }

        Ok(ChatResponse {
            tokens_generated: word_count(&reply),
            message: Message::assistant(reply),
            model: self.model.clone(),
            cached,
        })
    }

    /// Operational counters for a health endpoint.
    pub fn health(&self) -> HealthReport {
        HealthReport {
            status: "healthy",
            version: env!("CARGO_PKG_VERSION"),
            model: self.model.clone(),
            generator: self.generator.name().to_owned(),
            response_cache: self.responses.stats(),
            sessions: self.sessions.stats(),
            rate_limit: self.limiter.stats(),
        }
    }

    /// Spawn the background sweepers and bucket pruner configured at build
    /// time. Returns their handles; nothing is spawned when none is
    /// configured.
    ///
    /// # Panics
    ///
    /// Requires a tokio runtime context.
    pub fn spawn_maintenance(&self) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();
        if let Some(interval) = self.maintenance.response_sweep {
            handles.push(self.responses.spawn_sweeper(interval));
        }
        if let Some(interval) = self.maintenance.session_sweep {
            handles.push(self.sessions.spawn_sweeper(interval));
        }
        if let Some(idle) = self.maintenance.bucket_idle_timeout {
            handles.push(self.limiter.spawn_pruner(idle, idle));
        }
        handles
    }
}

/// Render a conversation as a single prompt.
///
/// Each message becomes a `Role: content` block, blocks are separated by a
/// blank line, and a trailing `Assistant:` cues the reply.
pub fn format_chat_prompt(messages: &[Message]) -> String {
    let mut parts: Vec<String> = messages
        .iter()
        .map(|message| {
            let label = match message.role {
                Role::System => "System",
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            format!("{label}: {}", message.content)
        })
        .collect();
    parts.push("Assistant:".to_owned());
    parts.join("\n\n")
}
