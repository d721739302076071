//! Router: asks the model what to do next.
//!
//! Every call carries the full history plus the registry's tool schemas.
//! The answer is a [`Decision`]; backend failures never escape, they turn
//! into a final answer explaining what went wrong.

use std::sync::Arc;
use std::time::Duration;

use toolchat_config::AppConfig;
use toolchat_core::error::ProviderError;
use toolchat_core::message::Message;
use toolchat_core::provider::{Decision, Provider, ProviderRequest};
use toolchat_core::tool::ToolRegistry;
use tracing::{debug, warn};

/// Prefix of the final answer produced when the model backend fails.
pub const BACKEND_ERROR_PREFIX: &str = "Error communicating with LLM";

pub struct ModelRouter {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    timeout: Duration,
    max_retries: u32,
    initial_backoff: Duration,
    system_prompt: Option<String>,
}

impl ModelRouter {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            tools,
            model: model.into(),
            temperature: 0.0,
            max_tokens: None,
            timeout: Duration::from_secs(20),
            max_retries: 2,
            initial_backoff: Duration::from_millis(500),
            system_prompt: None,
        }
    }

    /// Build a router with the deployment's model, timeout, and retry policy.
    pub fn from_config(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        config: &AppConfig,
    ) -> Self {
        let mut router = Self::new(provider, tools, &config.default_model)
            .with_temperature(config.default_temperature)
            .with_timeout(Duration::from_secs(config.router.timeout_secs))
            .with_max_retries(config.router.max_retries);
        router.max_tokens = config.default_max_tokens;
        router.system_prompt = config.agent.system_prompt.clone();
        router
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Delay before the first retry; doubles for each later one.
    pub fn with_backoff(mut self, initial: Duration) -> Self {
        self.initial_backoff = initial;
        self
    }

    /// Instructions sent ahead of the history on every call, never stored.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Ask the model for the next step. Never fails.
    pub async fn decide(&self, history: &[Message]) -> Decision {
        match self.complete(history).await {
            Ok(message) => Decision::from_message(message),
            Err(e) => {
                warn!(provider = self.provider.name(), error = %e, "Model backend failed");
                Decision::FinalAnswer(format!("{BACKEND_ERROR_PREFIX}: {e}"))
            }
        }
    }

    /// Whether the model backend answers its health probe within the timeout.
    pub async fn backend_reachable(&self) -> bool {
        match tokio::time::timeout(self.timeout, self.provider.health_check()).await {
            Ok(Ok(reachable)) => reachable,
            Ok(Err(e)) => {
                warn!(provider = self.provider.name(), error = %e, "Health probe failed");
                false
            }
            Err(_) => false,
        }
    }

    async fn complete(&self, history: &[Message]) -> Result<Message, ProviderError> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        if let Some(prompt) = &self.system_prompt {
            messages.push(Message::system(prompt.clone()));
        }
        messages.extend_from_slice(history);

        let request = ProviderRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: self.tools.definitions(),
        };

        let mut attempt = 0;
        let mut backoff = self.initial_backoff;
        loop {
            let result =
                match tokio::time::timeout(self.timeout, self.provider.complete(request.clone()))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout(format!(
                        "no response from '{}' within {}s",
                        self.provider.name(),
                        self.timeout.as_secs()
                    ))),
                };

            match result {
                Ok(response) => {
                    debug!(
                        model = %response.model,
                        tool_calls = response.message.tool_calls.len(),
                        prompt_tokens = response.usage.as_ref().map(|u| u.prompt_tokens),
                        completion_tokens = response.usage.as_ref().map(|u| u.completion_tokens),
                        "Model responded"
                    );
                    return Ok(response.message);
                }
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        error = %e,
                        attempt,
                        max_retries = self.max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        "Model call failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
