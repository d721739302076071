//! Error types for the toolchat domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all toolchat operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Conversation store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Orchestration errors ---
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Whether a fresh attempt has a chance of succeeding.
    ///
    /// Transport failures, timeouts, rate limiting and server-side (5xx)
    /// errors are transient; auth failures and other 4xx are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::RateLimited { .. } => true,
            Self::ApiError { status_code, .. } => *status_code >= 500,
            Self::AuthenticationFailed(_) | Self::NotConfigured(_) | Self::InvalidResponse(_) => {
                false
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool already registered: {0}")]
    DuplicateTool(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Network error: {0}")]
    Network(String),
}

impl ToolError {
    /// Short failure category, reported to the model alongside the message.
    pub fn category(&self) -> &'static str {
        match self {
            Self::DuplicateTool(_) => "DuplicateTool",
            Self::InvalidArguments(_) => "InvalidArguments",
            Self::ExecutionFailed { .. } => "ExecutionFailed",
            Self::Timeout { .. } => "Timeout",
            Self::Network(_) => "NetworkError",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Corrupt message record: {0}")]
    Corrupt(String),
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Model requested tools for {max_rounds} rounds without producing an answer")]
    RoundLimitExceeded { max_rounds: u32 },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}
