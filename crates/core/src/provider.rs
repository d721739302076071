//! Provider trait: the abstraction over chat-completion backends.
//!
//! A Provider knows how to send an ordered message history plus the
//! advertised tool schemas to a model and get exactly one message back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::{Message, ToolCall};

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "google/gemini-2.0-flash-001")
    pub model: String,

    /// The conversation messages
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic)
    #[serde(default)]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

/// A tool definition sent to the model so it knows what tools it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// A complete response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated message
    pub message: Message,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// What the model decided to do with the current history.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// The model answered; the conversation turn is complete.
    FinalAnswer(String),
    /// The model wants these tools run before it answers.
    ToolCallsRequested(Vec<ToolCall>),
}

impl Decision {
    /// Interpret a model message.
    pub fn from_message(message: Message) -> Self {
        if message.tool_calls.is_empty() {
            Decision::FinalAnswer(message.content)
        } else {
            Decision::ToolCallsRequested(message.tool_calls)
        }
    }

    /// The assistant message to append to the history for this decision.
    pub fn to_message(&self) -> Message {
        match self {
            Decision::FinalAnswer(text) => Message::assistant(text.clone()),
            Decision::ToolCallsRequested(calls) => Message::tool_request(calls.clone()),
        }
    }
}

/// The core Provider trait.
///
/// Every chat-completion backend implements this trait. The router calls
/// `complete()` without knowing which backend is behind it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openrouter").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError>;

    /// Health check: can we reach the provider?
    async fn health_check(&self) -> Result<bool, ProviderError> {
        Ok(true)
    }
}
