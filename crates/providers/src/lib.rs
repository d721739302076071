//! Chat-completion backends for toolchat.
//!
//! All providers implement the `toolchat_core::Provider` trait.
//! [`factory::build_from_config`] picks the backend named in configuration.

pub mod factory;
pub mod openai_compat;

pub use factory::build_from_config;
pub use openai_compat::OpenAiCompatProvider;
