//! The send pipeline: validate, persist, fan out, then hand off to the
//! assistant when the chat has one.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    assistant::AssistantPipeline,
    error::{ApiError, ApiResult},
    models::{Chat, ChatView, Message, MessageView, ReplySummary},
    realtime::{GatewayState, ServerEvent},
    store::{BlobStore, ChatStore},
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageInput {
    pub chat_id: String,
    #[serde(default)]
    pub content: Option<String>,
    /// Base64 payload (raw or data URI); replaced by a durable reference
    /// before persistence.
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub reply_to_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageOutput {
    pub user_message: MessageView,
    pub ai_response: Option<MessageView>,
    pub chat: ChatView,
}

pub struct DeliveryService {
    store: Arc<dyn ChatStore>,
    blobs: Arc<dyn BlobStore>,
    gateway: Arc<GatewayState>,
    assistant: AssistantPipeline,
}

impl DeliveryService {
    pub fn new(
        store: Arc<dyn ChatStore>,
        blobs: Arc<dyn BlobStore>,
        gateway: Arc<GatewayState>,
        assistant: AssistantPipeline,
    ) -> Self {
        Self {
            store,
            blobs,
            gateway,
            assistant,
        }
    }

    /// Persist and deliver one message, then run the assistant pipeline for
    /// AI chats. Returns only after the assistant reply (if any) is complete,
    /// so the response carries the final state of the exchange.
    pub async fn send(
        &self,
        sender_id: &str,
        input: SendMessageInput,
    ) -> ApiResult<SendMessageOutput> {
        if input.content.as_deref().map_or(true, str::is_empty) && input.image.is_none() {
            return Err(ApiError::BadRequest(
                "Message must have content or an image".to_string(),
            ));
        }

        if !self.store.is_participant(&input.chat_id, sender_id).await? {
            return Err(ApiError::Forbidden(
                "Chat not found or unauthorized".to_string(),
            ));
        }

        let sender = self
            .store
            .user(sender_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

        // The reply target must already exist in this chat.
        let reply_summary = match &input.reply_to_id {
            Some(reply_id) => Some(self.reply_summary(&input.chat_id, reply_id).await?),
            None => None,
        };

        let image_ref = match &input.image {
            Some(data) => Some(
                self.blobs
                    .store_image(data)
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?,
            ),
            None => None,
        };

        let message = Message::new(
            &input.chat_id,
            sender_id,
            input.content.clone(),
            image_ref,
            input.reply_to_id.clone(),
        );
        self.store.insert_message(&message).await?;
        self.store
            .set_last_message(&input.chat_id, &message.id)
            .await?;
        let view = message.to_view(sender.clone(), reply_summary);
        info!(chat = %input.chat_id, message = %message.id, "Message persisted");

        // Room fan-out skips the sender's own connection; it already shows an
        // optimistic copy and reconciles from the HTTP response.
        let except = self.gateway.presence.conn_of(sender_id);
        self.gateway.broadcast_room(
            &input.chat_id,
            ServerEvent::MessageNew {
                message: view.clone(),
            },
            except.as_deref(),
        );

        let chat = self
            .store
            .chat(&input.chat_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Chat not found".to_string()))?;
        for participant in &chat.participants {
            self.gateway.send_to_user(
                participant,
                ServerEvent::ChatUpdate {
                    chat_id: input.chat_id.clone(),
                    last_message: view.clone(),
                },
            );
        }

        let ai_response = if chat.is_ai_chat {
            match self.assistant.respond(&message).await {
                Ok(reply) => reply,
                // A missing assistant identity degrades the chat to
                // human-only instead of failing the send.
                Err(ApiError::NotFound(reason)) => {
                    warn!(chat = %input.chat_id, %reason, "Skipping assistant reply");
                    None
                }
                Err(e) => return Err(e),
            }
        } else {
            None
        };

        // Re-read so the returned chat reflects the assistant's last-message
        // update when one happened.
        let chat = self
            .store
            .chat(&input.chat_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Chat not found".to_string()))?;
        let chat = self.chat_view(chat).await?;

        Ok(SendMessageOutput {
            user_message: view,
            ai_response,
            chat,
        })
    }

    /// Push `chat:new` to every participant of a freshly created chat.
    /// Called by the chat CRUD layer after it commits the row.
    pub async fn announce_chat(&self, chat_id: &str) -> ApiResult<()> {
        let chat = self
            .store
            .chat(chat_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Chat not found".to_string()))?;
        let participant_ids = chat.participants.clone();
        let view = self.chat_view(chat).await?;
        self.gateway.notify_chat_created(&participant_ids, view);
        Ok(())
    }

    async fn reply_summary(&self, chat_id: &str, reply_id: &str) -> ApiResult<ReplySummary> {
        let quoted = self
            .store
            .message(reply_id)
            .await?
            .filter(|m| m.chat_id == chat_id)
            .ok_or_else(|| ApiError::NotFound("Reply message not found".to_string()))?;
        let sender = self
            .store
            .user(&quoted.sender_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Reply message not found".to_string()))?;
        Ok(ReplySummary {
            id: quoted.id,
            content: quoted.content,
            image: quoted.image,
            sender,
        })
    }

    async fn message_view(&self, message: &Message) -> ApiResult<MessageView> {
        let sender = self
            .store
            .user(&message.sender_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
        let reply = match &message.reply_to {
            Some(reply_id) => self.reply_summary(&message.chat_id, reply_id).await.ok(),
            None => None,
        };
        Ok(message.to_view(sender, reply))
    }

    async fn chat_view(&self, chat: Chat) -> ApiResult<ChatView> {
        let mut participants = Vec::with_capacity(chat.participants.len());
        for id in &chat.participants {
            if let Some(user) = self.store.user(id).await? {
                participants.push(user);
            }
        }
        let last_message = match &chat.last_message {
            Some(message_id) => match self.store.message(message_id).await? {
                Some(message) => Some(self.message_view(&message).await?),
                None => None,
            },
            None => None,
        };
        Ok(ChatView {
            id: chat.id,
            participants,
            is_ai_chat: chat.is_ai_chat,
            last_message,
            created_at: chat.created_at,
        })
    }
}
