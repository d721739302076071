//! Conversation store implementations for toolchat.
//!
//! - [`InMemoryStore`] keeps histories in process memory (tests, ephemeral runs)
//! - [`SqliteStore`] persists them across restarts
//! - [`SessionLocks`] serializes writers of one session while leaving
//!   other sessions free to proceed

pub mod in_memory;
pub mod locks;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryStore;
pub use locks::{SessionGuard, SessionLocks};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use std::sync::Arc;

use toolchat_config::StorageConfig;
use toolchat_core::error::StoreError;
use toolchat_core::store::ConversationStore;

/// Open the store selected by configuration.
pub async fn open_from_config(
    config: &StorageConfig,
) -> Result<Arc<dyn ConversationStore>, StoreError> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(InMemoryStore::new())),
        #[cfg(feature = "sqlite")]
        "sqlite" => Ok(Arc::new(SqliteStore::new(&config.database_path).await?)),
        other => Err(StoreError::Storage(format!(
            "storage backend '{other}' is not available in this build"
        ))),
    }
}
