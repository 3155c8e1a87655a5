//! Interfaces to the external persistence collaborators.
//!
//! The relational store and the attachment store are excluded collaborators;
//! the core talks to them through these traits. `MemoryStore` and
//! `MemoryBlobStore` back the tests and the standalone binary.

use anyhow::Result;
use async_trait::async_trait;
use base64::Engine as _;
use dashmap::DashMap;

use crate::models::{Chat, Message, User};

/// Read/write access to users, chats and messages.
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn user(&self, user_id: &str) -> Result<Option<User>>;

    /// The designated assistant participant record, if one exists.
    async fn ai_identity(&self) -> Result<Option<User>>;

    async fn chat(&self, chat_id: &str) -> Result<Option<Chat>>;

    async fn is_participant(&self, chat_id: &str, user_id: &str) -> Result<bool>;

    async fn message(&self, message_id: &str) -> Result<Option<Message>>;

    async fn insert_message(&self, message: &Message) -> Result<()>;

    /// Move the chat's lastMessage pointer.
    async fn set_last_message(&self, chat_id: &str, message_id: &str) -> Result<()>;

    /// The most recent `limit` messages of a chat, oldest first.
    async fn recent_messages(&self, chat_id: &str, limit: usize) -> Result<Vec<Message>>;
}

/// Durable storage for image attachments. Input is base64 payload data,
/// output an opaque durable reference.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn store_image(&self, data: &str) -> Result<String>;
}

/// In-memory `ChatStore`, ordered per chat by insertion.
#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<String, User>,
    chats: DashMap<String, Chat>,
    messages: DashMap<String, Message>,
    chat_messages: DashMap<String, Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, user: User) {
        self.users.insert(user.id.clone(), user);
    }

    pub fn add_chat(&self, chat: Chat) {
        self.chats.insert(chat.id.clone(), chat);
    }

    /// Make sure an assistant identity exists, returning it.
    pub fn seed_ai_identity(&self, name: &str) -> User {
        if let Some(existing) = self.users.iter().find(|u| u.is_ai) {
            return existing.clone();
        }
        let ai = User {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            avatar: None,
            is_ai: true,
        };
        self.users.insert(ai.id.clone(), ai.clone());
        ai
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn user(&self, user_id: &str) -> Result<Option<User>> {
        Ok(self.users.get(user_id).map(|u| u.clone()))
    }

    async fn ai_identity(&self) -> Result<Option<User>> {
        Ok(self.users.iter().find(|u| u.is_ai).map(|u| u.clone()))
    }

    async fn chat(&self, chat_id: &str) -> Result<Option<Chat>> {
        Ok(self.chats.get(chat_id).map(|c| c.clone()))
    }

    async fn is_participant(&self, chat_id: &str, user_id: &str) -> Result<bool> {
        Ok(self
            .chats
            .get(chat_id)
            .map(|c| c.participants.iter().any(|p| p == user_id))
            .unwrap_or(false))
    }

    async fn message(&self, message_id: &str) -> Result<Option<Message>> {
        Ok(self.messages.get(message_id).map(|m| m.clone()))
    }

    async fn insert_message(&self, message: &Message) -> Result<()> {
        self.messages.insert(message.id.clone(), message.clone());
        self.chat_messages
            .entry(message.chat_id.clone())
            .or_default()
            .push(message.id.clone());
        Ok(())
    }

    async fn set_last_message(&self, chat_id: &str, message_id: &str) -> Result<()> {
        if let Some(mut chat) = self.chats.get_mut(chat_id) {
            chat.last_message = Some(message_id.to_string());
        }
        Ok(())
    }

    async fn recent_messages(&self, chat_id: &str, limit: usize) -> Result<Vec<Message>> {
        let ids = self
            .chat_messages
            .get(chat_id)
            .map(|v| v.clone())
            .unwrap_or_default();
        let start = ids.len().saturating_sub(limit);
        Ok(ids[start..]
            .iter()
            .filter_map(|id| self.messages.get(id).map(|m| m.clone()))
            .collect())
    }
}

/// In-memory `BlobStore` that validates the payload and hands back a
/// `blob:<uuid>` reference.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: DashMap<String, Vec<u8>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn store_image(&self, data: &str) -> Result<String> {
        // Accept raw base64 or a data URI; reject anything undecodable.
        let encoded = data.rsplit(',').next().unwrap_or(data);
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| anyhow::anyhow!("invalid image payload: {e}"))?;
        let reference = format!("blob:{}", uuid::Uuid::new_v4());
        self.blobs.insert(reference.clone(), bytes);
        Ok(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn chat(id: &str, participants: &[&str]) -> Chat {
        Chat {
            id: id.into(),
            participants: participants.iter().map(|s| s.to_string()).collect(),
            is_ai_chat: false,
            last_message: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn recent_messages_returns_tail_in_order() {
        let store = MemoryStore::new();
        store.add_chat(chat("c1", &["a", "b"]));

        for i in 0..8 {
            let msg = Message::new("c1", "a", Some(format!("m{i}")), None, None);
            store.insert_message(&msg).await.unwrap();
        }

        let recent = store.recent_messages("c1", 5).await.unwrap();
        let contents: Vec<_> = recent
            .iter()
            .map(|m| m.content.clone().unwrap())
            .collect();
        assert_eq!(contents, vec!["m3", "m4", "m5", "m6", "m7"]);
    }

    #[tokio::test]
    async fn participant_check() {
        let store = MemoryStore::new();
        store.add_chat(chat("c1", &["a", "b"]));

        assert!(store.is_participant("c1", "a").await.unwrap());
        assert!(!store.is_participant("c1", "z").await.unwrap());
        assert!(!store.is_participant("missing", "a").await.unwrap());
    }

    #[tokio::test]
    async fn blob_store_rejects_garbage() {
        let blobs = MemoryBlobStore::new();
        assert!(blobs.store_image("aGVsbG8=").await.is_ok());
        assert!(blobs
            .store_image("data:image/png;base64,aGVsbG8=")
            .await
            .is_ok());
        assert!(blobs.store_image("!!not-base64!!").await.is_err());
    }
}
