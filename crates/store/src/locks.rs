//! Per-session mutual exclusion.
//!
//! Two requests against the same conversation must not interleave their
//! appends, while different conversations run fully in parallel. Each
//! session id maps to its own async mutex; the entry is dropped from the
//! table once nobody holds or waits on it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;
use toolchat_core::message::ConversationId;
use tracing::trace;

type LockTable = Mutex<HashMap<ConversationId, Arc<tokio::sync::Mutex<()>>>>;

/// A table of per-session locks. Cheap to clone; clones share the table.
#[derive(Clone, Default)]
pub struct SessionLocks {
    table: Arc<LockTable>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`. Access lasts until the guard drops.
    pub async fn lock(&self, id: &ConversationId) -> SessionGuard {
        let mutex = {
            let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
            table.entry(id.clone()).or_default().clone()
        };
        let guard = mutex.lock_owned().await;
        trace!(thread_id = %id, "Session lock acquired");
        SessionGuard {
            id: id.clone(),
            guard: Some(guard),
            table: self.table.clone(),
        }
    }

    /// Number of sessions currently held or awaited.
    pub fn active(&self) -> usize {
        self.table.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Exclusive access to one session. Releases on drop.
pub struct SessionGuard {
    id: ConversationId,
    guard: Option<OwnedMutexGuard<()>>,
    table: Arc<LockTable>,
}

impl SessionGuard {
    pub fn conversation_id(&self) -> &ConversationId {
        &self.id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        // Only the table's own reference left: nobody holds or waits on it.
        if table
            .get(&self.id)
            .is_some_and(|mutex| Arc::strong_count(mutex) == 1)
        {
            table.remove(&self.id);
        }
    }
}
