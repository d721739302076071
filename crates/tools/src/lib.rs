//! Built-in tool implementations for toolchat.
//!
//! Tools let the model reach outside the conversation: search the web,
//! look things up in Wikipedia, do arithmetic, and fetch stock quotes.

pub mod calculator;
pub mod encyclopedia;
pub mod stock_quote;
pub mod web_search;

use std::sync::Arc;

use toolchat_config::ToolsConfig;
use toolchat_core::error::ToolError;
use toolchat_core::tool::ToolRegistry;

pub use calculator::CalculatorTool;
pub use encyclopedia::EncyclopediaTool;
pub use stock_quote::StockQuoteTool;
pub use web_search::WebSearchTool;

/// Create a registry holding all built-in tools, wired to the configured endpoints.
pub fn default_registry(config: &ToolsConfig) -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(WebSearchTool::new(
        &config.search_base_url,
        config.search_max_results,
    )))?;
    registry.register(Arc::new(EncyclopediaTool::new(
        &config.encyclopedia_base_url,
        config.encyclopedia_max_chars,
    )))?;
    registry.register(Arc::new(CalculatorTool))?;
    registry.register(Arc::new(StockQuoteTool::new(
        &config.stock_base_url,
        &config.stock_api_key,
    )))?;
    Ok(registry)
}
