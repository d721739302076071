pub mod chat;
pub mod serve;
pub mod tools;

use std::path::Path;

use anyhow::Context;
use toolchat_config::AppConfig;

/// Load configuration, failing early when no model API key is available.
pub fn load_with_key(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = AppConfig::load(path).context("Failed to load config")?;
    config.require_api_key().with_context(|| {
        format!(
            "Add an API key to {} or a .env file",
            path.map(Path::to_path_buf)
                .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
                .display()
        )
    })?;
    Ok(config)
}
