//! Provider construction from configuration.

use std::sync::Arc;

use toolchat_config::AppConfig;
use toolchat_core::error::ProviderError;
use toolchat_core::provider::Provider;

use crate::openai_compat::OpenAiCompatProvider;

/// Build the configured model backend.
///
/// Every supported backend speaks the OpenAI chat-completions dialect, so
/// the backend name only selects the default base URL; `api_url` overrides it.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let api_key = config.api_key.clone().ok_or_else(|| {
        ProviderError::NotConfigured(format!(
            "no API key configured for provider '{}'",
            config.default_provider
        ))
    })?;

    let base_url = match &config.api_url {
        Some(url) => url.clone(),
        None => default_base_url(&config.default_provider)?,
    };

    Ok(Arc::new(OpenAiCompatProvider::new(
        &config.default_provider,
        base_url,
        api_key,
    )))
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> Result<String, ProviderError> {
    let url = match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1",
        "openai" => "https://api.openai.com/v1",
        "ollama" => "http://localhost:11434/v1",
        "deepseek" => "https://api.deepseek.com/v1",
        "groq" => "https://api.groq.com/openai/v1",
        "together" => "https://api.together.xyz/v1",
        "vllm" => "http://localhost:8000/v1",
        other => {
            return Err(ProviderError::NotConfigured(format!(
                "unknown provider '{other}'; set api_url to use a custom endpoint"
            )));
        }
    };
    Ok(url.to_string())
}
