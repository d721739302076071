//! Configuration loading, validation, and management for toolchat.
//!
//! Loads configuration from `~/.toolchat/config.toml` (or an explicit path)
//! with `.env` and environment variable overrides. Validates all settings
//! at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.toolchat/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the model backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model backend (an OpenAI-compatible endpoint name)
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Override for the backend base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default)]
    pub default_temperature: f32,

    /// Default max tokens per model response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_max_tokens: Option<u32>,

    /// Model-call timeout and retry policy
    #[serde(default)]
    pub router: RouterConfig,

    /// Orchestration loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Built-in tool settings
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Conversation persistence
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP gateway
    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_provider() -> String {
    "openrouter".into()
}
fn default_model() -> String {
    "google/gemini-2.0-flash-001".into()
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("router", &self.router)
            .field("agent", &self.agent)
            .field("tools", &self.tools)
            .field("storage", &self.storage)
            .field("gateway", &self.gateway)
            .finish()
    }
}

/// Fixed per-deployment policy for model-backend calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Per-attempt timeout
    #[serde(default = "default_router_timeout")]
    pub timeout_secs: u64,

    /// Extra attempts after the first failure
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_router_timeout() -> u64 {
    20
}
fn default_max_retries() -> u32 {
    2
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_router_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum model invocations per chat request
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,

    /// Instructions prepended to every model call (never persisted)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

fn default_max_rounds() -> u32 {
    8
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            system_prompt: None,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Per-call timeout applied by the dispatcher
    #[serde(default = "default_tool_timeout")]
    pub timeout_secs: u64,

    /// Market-data API key
    #[serde(default = "default_stock_api_key")]
    pub stock_api_key: String,

    #[serde(default = "default_stock_base_url")]
    pub stock_base_url: String,

    #[serde(default = "default_search_base_url")]
    pub search_base_url: String,

    #[serde(default = "default_search_max_results")]
    pub search_max_results: usize,

    #[serde(default = "default_encyclopedia_base_url")]
    pub encyclopedia_base_url: String,

    #[serde(default = "default_encyclopedia_max_chars")]
    pub encyclopedia_max_chars: usize,
}

fn default_tool_timeout() -> u64 {
    30
}
fn default_stock_api_key() -> String {
    "demo".into()
}
fn default_stock_base_url() -> String {
    "https://www.alphavantage.co".into()
}
fn default_search_base_url() -> String {
    "https://api.duckduckgo.com".into()
}
fn default_search_max_results() -> usize {
    5
}
fn default_encyclopedia_base_url() -> String {
    "https://en.wikipedia.org".into()
}
fn default_encyclopedia_max_chars() -> usize {
    4000
}

impl std::fmt::Debug for ToolsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolsConfig")
            .field("timeout_secs", &self.timeout_secs)
            .field("stock_api_key", &"[REDACTED]")
            .field("stock_base_url", &self.stock_base_url)
            .field("search_base_url", &self.search_base_url)
            .field("search_max_results", &self.search_max_results)
            .field("encyclopedia_base_url", &self.encyclopedia_base_url)
            .field("encyclopedia_max_chars", &self.encyclopedia_max_chars)
            .finish()
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_tool_timeout(),
            stock_api_key: default_stock_api_key(),
            stock_base_url: default_stock_base_url(),
            search_base_url: default_search_base_url(),
            search_max_results: default_search_max_results(),
            encyclopedia_base_url: default_encyclopedia_base_url(),
            encyclopedia_max_chars: default_encyclopedia_max_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// "sqlite" or "memory"
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    #[serde(default = "default_database_path")]
    pub database_path: String,
}

fn default_storage_backend() -> String {
    "sqlite".into()
}
fn default_database_path() -> String {
    "toolchat.db".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            database_path: default_database_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Browser origins allowed by CORS
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".into(),
        "http://127.0.0.1:5173".into(),
    ]
}
fn default_max_body_bytes() -> usize {
    1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            cors_origins: default_cors_origins(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `path`, or from the default location
    /// (`~/.toolchat/config.toml`) when `None`.
    ///
    /// A `.env` file in the working directory is loaded first. Environment
    /// variables then override the file:
    /// - `TOOLCHAT_API_KEY`, `OPENROUTER_API_KEY`, `OPENAI_API_KEY` (first wins)
    /// - `TOOLCHAT_MODEL`
    /// - `TOOLCHAT_DATABASE`
    /// - `ALPHA_VANTAGE_API_KEY`
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Ok(env_path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", env_path.display());
        }

        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_dir().join("config.toml"),
        };
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("TOOLCHAT_API_KEY")
                .or_else(|| lookup("OPENROUTER_API_KEY"))
                .or_else(|| lookup("OPENAI_API_KEY"))
                .filter(|k| !k.trim().is_empty());
        }

        if let Some(model) = lookup("TOOLCHAT_MODEL") {
            self.default_model = model;
        }

        if let Some(path) = lookup("TOOLCHAT_DATABASE") {
            self.storage.database_path = path;
        }

        if let Some(key) = lookup("ALPHA_VANTAGE_API_KEY") {
            self.tools.stock_api_key = key;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".toolchat")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_rounds == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_rounds must be at least 1".into(),
            ));
        }

        if self.router.timeout_secs == 0 || self.tools.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "router.timeout_secs and tools.timeout_secs must be > 0".into(),
            ));
        }

        if !matches!(self.storage.backend.as_str(), "sqlite" | "memory") {
            return Err(ConfigError::ValidationError(format!(
                "storage.backend must be \"sqlite\" or \"memory\", got \"{}\"",
                self.storage.backend
            )));
        }

        Ok(())
    }

    /// The API key, or an error naming the variables that could supply it.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key.as_deref().ok_or(ConfigError::MissingApiKey)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            api_url: None,
            default_model: default_model(),
            default_temperature: 0.0,
            default_max_tokens: None,
            router: RouterConfig::default(),
            agent: AgentConfig::default(),
            tools: ToolsConfig::default(),
            storage: StorageConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error(
        "No API key found. Set TOOLCHAT_API_KEY, OPENROUTER_API_KEY or OPENAI_API_KEY, or add it to a .env file"
    )]
    MissingApiKey,
}
