//! The push-event catalog: tagged wire schemas for both directions.
//!
//! Every event kind has one discriminant, validated at the boundary; the tag
//! names match the catalog clients listen on (`message:new`, `chat:ai`, ...).

use serde::{Deserialize, Serialize};

use crate::models::{ChatView, MessageView, User};

/// Events a connected client may send over the socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "join")]
    Join {
        #[serde(rename = "chatId")]
        chat_id: String,
    },
    #[serde(rename = "leave")]
    Leave {
        #[serde(rename = "chatId")]
        chat_id: String,
    },
    #[serde(rename = "typing")]
    Typing {
        #[serde(rename = "chatId")]
        chat_id: String,
        #[serde(rename = "currentUserId")]
        user_id: String,
        name: String,
    },
    #[serde(rename = "stopTyping")]
    StopTyping {
        #[serde(rename = "chatId")]
        chat_id: String,
        #[serde(rename = "currentUserId")]
        user_id: String,
        name: String,
    },
}

/// Events pushed to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Full roster of currently-online user ids, sent to everyone on change.
    #[serde(rename = "online:users")]
    OnlineUsers { users: Vec<String> },

    /// Result of a `join` request (replaces the socket.io callback ack).
    #[serde(rename = "join:ack")]
    JoinAck {
        #[serde(rename = "chatId")]
        chat_id: String,
        error: Option<String>,
    },

    #[serde(rename = "typing:msg")]
    Typing {
        #[serde(rename = "currentUserId")]
        user_id: String,
        name: String,
    },

    #[serde(rename = "stopTyping:msg")]
    StopTyping {
        #[serde(rename = "currentUserId")]
        user_id: String,
        name: String,
    },

    #[serde(rename = "message:new")]
    MessageNew { message: MessageView },

    /// Last-message summary for chat-list views, sent on personal channels.
    #[serde(rename = "chat:update")]
    ChatUpdate {
        #[serde(rename = "chatId")]
        chat_id: String,
        #[serde(rename = "lastMessage")]
        last_message: MessageView,
    },

    #[serde(rename = "chat:new")]
    ChatNew { chat: ChatView },

    /// One increment of a streaming assistant reply, or its terminal frame.
    #[serde(rename = "chat:ai")]
    ChatAi {
        #[serde(rename = "chatId")]
        chat_id: String,
        chunk: Option<String>,
        sender: User,
        done: bool,
        message: Option<MessageView>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_event_tags() {
        let ev: ClientEvent =
            serde_json::from_str(r#"{"type":"join","chatId":"c1"}"#).unwrap();
        assert!(matches!(ev, ClientEvent::Join { chat_id } if chat_id == "c1"));

        let ev: ClientEvent = serde_json::from_str(
            r#"{"type":"typing","chatId":"c1","currentUserId":"u1","name":"Ada"}"#,
        )
        .unwrap();
        assert!(matches!(ev, ClientEvent::Typing { user_id, .. } if user_id == "u1"));
    }

    #[test]
    fn server_event_tags() {
        let json = serde_json::to_value(ServerEvent::OnlineUsers {
            users: vec!["u1".into()],
        })
        .unwrap();
        assert_eq!(json["type"], "online:users");

        let json = serde_json::to_value(ServerEvent::JoinAck {
            chat_id: "c1".into(),
            error: None,
        })
        .unwrap();
        assert_eq!(json["type"], "join:ack");
        assert!(json["error"].is_null());
    }

    #[test]
    fn unknown_event_is_rejected() {
        assert!(serde_json::from_str::<ClientEvent>(r#"{"type":"evil"}"#).is_err());
    }
}
