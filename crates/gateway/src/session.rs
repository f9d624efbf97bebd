//! Per-sender conversation sessions, kept in memory.

use despensa_core::message::{Conversation, ConversationId};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Conversation>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The sender's conversation so far, or a fresh one keyed by the sender.
    pub async fn get(&self, sender_id: &str) -> Conversation {
        self.sessions
            .read()
            .await
            .get(sender_id)
            .cloned()
            .unwrap_or_else(|| Conversation::with_id(ConversationId::from(sender_id)))
    }

    /// Store the conversation returned by a completed interaction.
    pub async fn replace(&self, sender_id: &str, conversation: Conversation) {
        self.sessions
            .write()
            .await
            .insert(sender_id.to_string(), conversation);
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
