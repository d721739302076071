//! `toolchat tools`: List the built-in tools.

use std::path::Path;

use anyhow::Context;
use toolchat_config::AppConfig;

pub fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = AppConfig::load(config_path).context("Failed to load config")?;
    let registry = toolchat_tools::default_registry(&config.tools)?;

    println!();
    for def in registry.definitions() {
        println!("  {:<22} {}", def.name, def.description);
    }
    println!();
    Ok(())
}
