//! Open claim conversations
//!
//! Each session sits behind its own mutex so the stages of one claim never
//! interleave, while different claims proceed concurrently.

use std::collections::HashMap;
use std::sync::Arc;

use core_kernel::ConversationId;
use domain_claims::{ClaimSession, StorageTarget};
use tokio::sync::{Mutex, RwLock};
use tracing::info;

pub type SharedSession = Arc<Mutex<ClaimSession>>;

/// In-process registry of claim sessions
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<ConversationId, SharedSession>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a conversation and returns a snapshot of it
    pub async fn open(&self, storage: Option<StorageTarget>) -> ClaimSession {
        let mut session = ClaimSession::new(ConversationId::new_v7());
        if let Some(target) = storage {
            session = session.with_storage(target);
        }

        let id = session.id();
        self.sessions
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(session.clone())));
        info!(conversation_id = %id, "Conversation opened");
        session
    }

    pub async fn get(&self, id: &ConversationId) -> Option<SharedSession> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Forgets a conversation
    ///
    /// A submission already holding the session lock still completes; later
    /// lookups miss.
    pub async fn close(&self, id: &ConversationId) -> Option<SharedSession> {
        let removed = self.sessions.write().await.remove(id);
        if removed.is_some() {
            info!(conversation_id = %id, "Conversation closed");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
