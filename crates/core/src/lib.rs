//! # toolchat core
//!
//! Domain types, traits, and error definitions for the toolchat agent service.
//! This crate has **no framework dependencies**: it defines the domain model
//! that the provider, store, tool, agent, and gateway crates implement against.
//!
//! Every collaborator of the orchestration loop is a trait here:
//! - [`Provider`]: a chat-completion backend
//! - [`Tool`]: an invocable capability, collected in a [`ToolRegistry`]
//! - [`ConversationStore`]: durable per-session message history

pub mod error;
pub mod message;
pub mod provider;
pub mod store;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{AgentError, Error, ProviderError, Result, StoreError, ToolError};
pub use message::{ConversationId, Message, Role, ToolCall};
pub use provider::{Decision, Provider, ProviderRequest, ProviderResponse, ToolDefinition};
pub use store::ConversationStore;
pub use tool::{ArgumentStyle, Tool, ToolRegistry, ToolResult};
