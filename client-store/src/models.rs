//! Client-side records. These mirror the server's wire views, plus local
//! delivery bookkeeping that never leaves the device.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub id: String,
    pub name: String,
    pub avatar: Option<String>,
    #[serde(default)]
    pub is_ai: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyRef {
    pub id: String,
    pub content: Option<String>,
    pub image: Option<String>,
    pub sender: UserRef,
}

/// Local delivery state of a message. `Pending` and `Failed` only ever apply
/// to messages this client authored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Delivery {
    Pending,
    Sent,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: String,
    pub chat_id: String,
    pub sender: UserRef,
    pub content: Option<String>,
    pub image: Option<String>,
    pub reply_to: Option<ReplyRef>,
    pub created_at: DateTime<Utc>,
    pub status: Delivery,
    /// An assistant reply still being streamed; cleared by the terminal frame.
    #[serde(default)]
    pub streaming: bool,
}

impl MessageRecord {
    /// A server-confirmed record, as parsed off the wire.
    pub fn delivered(
        id: impl Into<String>,
        chat_id: impl Into<String>,
        sender: UserRef,
        content: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            chat_id: chat_id.into(),
            sender,
            content,
            image: None,
            reply_to: None,
            created_at: Utc::now(),
            status: Delivery::Sent,
            streaming: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub id: String,
    pub participants: Vec<UserRef>,
    #[serde(default)]
    pub is_ai_chat: bool,
    pub last_message: Option<MessageRecord>,
    pub created_at: DateTime<Utc>,
}

/// What the user typed into the composer, before any ids exist.
#[derive(Debug, Clone, Default)]
pub struct Draft {
    pub content: Option<String>,
    pub image: Option<String>,
    pub reply_to: Option<ReplyRef>,
}
