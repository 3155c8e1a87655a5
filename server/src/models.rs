//! Core chat entities and their denormalized wire views.
//!
//! Storage rows (`User`, `Chat`, `Message`) hold ids only; everything that
//! crosses the wire is a view with the sender (and reply summary) populated,
//! so clients never have to chase references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chat participant. The AI identity is a regular user with `is_ai` set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub avatar: Option<String>,
    #[serde(default)]
    pub is_ai: bool,
}

/// A conversation. Participants and the AI flag are owned by the external
/// CRUD layer; the core only reads them and moves the `last_message` pointer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    pub participants: Vec<String>,
    #[serde(default)]
    pub is_ai_chat: bool,
    pub last_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A persisted message. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub content: Option<String>,
    pub image: Option<String>,
    pub reply_to: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(
        chat_id: impl Into<String>,
        sender_id: impl Into<String>,
        content: Option<String>,
        image: Option<String>,
        reply_to: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            chat_id: chat_id.into(),
            sender_id: sender_id.into(),
            content,
            image,
            reply_to,
            created_at: Utc::now(),
        }
    }

    /// Convert to the wire view with the sender and reply target resolved.
    pub fn to_view(&self, sender: User, reply_to: Option<ReplySummary>) -> MessageView {
        MessageView {
            id: self.id.clone(),
            chat_id: self.chat_id.clone(),
            sender,
            content: self.content.clone(),
            image: self.image.clone(),
            reply_to,
            created_at: self.created_at,
        }
    }
}

/// Denormalized summary of a replied-to message, enough for quoting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplySummary {
    pub id: String,
    pub content: Option<String>,
    pub image: Option<String>,
    pub sender: User,
}

/// Message as broadcast to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: String,
    pub chat_id: String,
    pub sender: User,
    pub content: Option<String>,
    pub image: Option<String>,
    pub reply_to: Option<ReplySummary>,
    pub created_at: DateTime<Utc>,
}

/// Chat as broadcast on `chat:new`, with participants populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatView {
    pub id: String,
    pub participants: Vec<User>,
    #[serde(default)]
    pub is_ai_chat: bool,
    pub last_message: Option<MessageView>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_view_serializes_camel_case() {
        let sender = User {
            id: "u1".into(),
            name: "Ada".into(),
            avatar: None,
            is_ai: false,
        };
        let msg = Message::new("c1", "u1", Some("hello".into()), None, None);
        let json = serde_json::to_value(msg.to_view(sender, None)).unwrap();

        assert_eq!(json["chatId"], "c1");
        assert_eq!(json["content"], "hello");
        assert!(json.get("createdAt").is_some());
        assert_eq!(json["sender"]["isAi"], false);
    }
}
