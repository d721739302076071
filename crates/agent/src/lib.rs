//! The agent: the loop that lets a model answer directly or call tools.
//!
//! 1. **Receive** a user message for a thread and persist it
//! 2. **Decide**: the [`ModelRouter`] asks the model, presenting the tool schemas
//! 3. **If tool calls**: the [`Dispatcher`] runs the round, results are persisted,
//!    and control goes back to step 2
//! 4. **If a final answer**: persist it and return it
//!
//! The loop ends on a final answer or when the round cap is hit.

pub mod dispatcher;
pub mod loop_runner;
pub mod router;

pub use dispatcher::Dispatcher;
pub use loop_runner::{AgentLoop, Turn};
pub use router::ModelRouter;

use toolchat_config::AppConfig;
use toolchat_core::error::Error;
use tracing::info;

/// Build the whole agent from configuration: model backend, store, tools.
pub async fn build_from_config(config: &AppConfig) -> Result<AgentLoop, Error> {
    let provider = toolchat_providers::build_from_config(config)?;
    let store = toolchat_store::open_from_config(&config.storage).await?;
    info!(
        provider = provider.name(),
        model = %config.default_model,
        store = store.name(),
        "Agent initialized"
    );
    Ok(AgentLoop::from_config(config, provider, store)?)
}
