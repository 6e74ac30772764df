//! Episodic conversation memory
//!
//! State is keyed by (user_id, conversation_id). History is bounded to
//! the most recent window with FIFO eviction; the last-retrieved set
//! holds at most K entries with 1-indexed positions referring to the
//! most recent retrieval turn. Concurrent requests for one conversation
//! serialize at the update step only.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use haven_types::Message;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::Result;

/// One entry of the last-retrieved property set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedRef {
    /// 1-indexed position within the retrieval turn.
    pub position: u32,
    pub property_id: String,
    pub title: String,
    pub turn_id: Uuid,
}

/// Read-side view of a conversation
#[derive(Debug, Clone)]
pub struct ConversationSnapshot {
    pub history: Vec<Message>,
    pub last_retrieved: Vec<RetrievedRef>,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

impl ConversationSnapshot {
    fn fresh() -> Self {
        let now = Utc::now();
        Self {
            history: Vec::new(),
            last_retrieved: Vec::new(),
            created_at: now,
            last_active_at: now,
        }
    }
}

/// Store contract shared by the in-memory and relational backends
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Fetch the conversation, creating a fresh one when absent.
    async fn load_or_create(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> Result<ConversationSnapshot>;

    /// Append one user/assistant turn, bounding history to
    /// `history_window` messages (FIFO eviction). When `last_retrieved`
    /// is given it replaces the previous set wholesale.
    #[allow(clippy::too_many_arguments)]
    async fn append_turn(
        &self,
        user_id: &str,
        conversation_id: &str,
        user_message: Message,
        assistant_message: Message,
        last_retrieved: Option<Vec<RetrievedRef>>,
        history_window: usize,
    ) -> Result<()>;
}

#[derive(Debug)]
struct StoredConversation {
    snapshot: ConversationSnapshot,
}

/// In-memory store; the default backend and the one tests run against
#[derive(Default)]
pub struct MemoryConversationStore {
    conversations: DashMap<(String, String), Arc<Mutex<StoredConversation>>>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, user_id: &str, conversation_id: &str) -> Arc<Mutex<StoredConversation>> {
        self.conversations
            .entry((user_id.to_string(), conversation_id.to_string()))
            .or_insert_with(|| {
                Arc::new(Mutex::new(StoredConversation {
                    snapshot: ConversationSnapshot::fresh(),
                }))
            })
            .clone()
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn load_or_create(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> Result<ConversationSnapshot> {
        let entry = self.entry(user_id, conversation_id);
        let stored = entry.lock().await;
        Ok(stored.snapshot.clone())
    }

    async fn append_turn(
        &self,
        user_id: &str,
        conversation_id: &str,
        user_message: Message,
        assistant_message: Message,
        last_retrieved: Option<Vec<RetrievedRef>>,
        history_window: usize,
    ) -> Result<()> {
        let entry = self.entry(user_id, conversation_id);
        let mut stored = entry.lock().await;

        stored.snapshot.history.push(user_message);
        stored.snapshot.history.push(assistant_message);
        let overflow = stored.snapshot.history.len().saturating_sub(history_window);
        if overflow > 0 {
            stored.snapshot.history.drain(..overflow);
        }

        if let Some(retrieved) = last_retrieved {
            stored.snapshot.last_retrieved = retrieved;
        }
        stored.snapshot.last_active_at = Utc::now();
        Ok(())
    }
}

/// Build the last-retrieved set from a ranked document list, capping at
/// `k` entries and assigning 1-indexed positions.
pub fn build_retrieved_refs(
    documents: &[haven_types::RetrievedDocument],
    turn_id: Uuid,
    k: usize,
) -> Vec<RetrievedRef> {
    documents
        .iter()
        .take(k)
        .enumerate()
        .map(|(index, document)| RetrievedRef {
            position: (index + 1) as u32,
            property_id: document.property_id.clone(),
            title: document.title.clone(),
            turn_id,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use haven_types::RetrievedDocument;

    #[tokio::test]
    async fn history_evicts_fifo_beyond_window() {
        let store = MemoryConversationStore::new();
        for i in 0..8 {
            store
                .append_turn(
                    "u1",
                    "c1",
                    Message::user(format!("q{i}")),
                    Message::assistant(format!("a{i}")),
                    None,
                    10,
                )
                .await
                .unwrap();
        }

        let snapshot = store.load_or_create("u1", "c1").await.unwrap();
        assert_eq!(snapshot.history.len(), 10);
        // Oldest messages are gone; the newest turn is last
        assert_eq!(snapshot.history[0].content, "a3");
        assert_eq!(snapshot.history[9].content, "a7");
    }

    #[tokio::test]
    async fn last_retrieved_replaces_wholesale_and_caps_at_k() {
        let store = MemoryConversationStore::new();
        let turn = Uuid::new_v4();
        let documents: Vec<RetrievedDocument> = (1..=8)
            .map(|i| RetrievedDocument::new(format!("p-{i}"), format!("title {i}")))
            .collect();

        let refs = build_retrieved_refs(&documents, turn, 5);
        assert_eq!(refs.len(), 5);
        assert_eq!(refs[0].position, 1);
        assert_eq!(refs[4].property_id, "p-5");

        store
            .append_turn(
                "u1",
                "c1",
                Message::user("search"),
                Message::assistant("results"),
                Some(refs),
                10,
            )
            .await
            .unwrap();

        let newer = build_retrieved_refs(&documents[..2], turn, 5);
        store
            .append_turn(
                "u1",
                "c1",
                Message::user("narrower"),
                Message::assistant("fewer"),
                Some(newer),
                10,
            )
            .await
            .unwrap();

        let snapshot = store.load_or_create("u1", "c1").await.unwrap();
        assert_eq!(snapshot.last_retrieved.len(), 2);
    }

    #[tokio::test]
    async fn conversations_are_isolated_by_key() {
        let store = MemoryConversationStore::new();
        store
            .append_turn("u1", "c1", Message::user("a"), Message::assistant("b"), None, 10)
            .await
            .unwrap();

        let other = store.load_or_create("u1", "c2").await.unwrap();
        assert!(other.history.is_empty());
        let other_user = store.load_or_create("u2", "c1").await.unwrap();
        assert!(other_user.history.is_empty());
    }

    #[tokio::test]
    async fn concurrent_turns_serialize_without_loss() {
        let store = Arc::new(MemoryConversationStore::new());
        let mut handles = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .append_turn(
                        "u1",
                        "c1",
                        Message::user(format!("q{i}")),
                        Message::assistant(format!("a{i}")),
                        None,
                        100,
                    )
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let snapshot = store.load_or_create("u1", "c1").await.unwrap();
        assert_eq!(snapshot.history.len(), 40);
    }
}
