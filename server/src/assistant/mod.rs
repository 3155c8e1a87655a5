//! Assistant reply pipeline: context assembly, token streaming and the
//! terminal persist-and-replace frame.

pub mod gemini;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::{debug, info};

use crate::{
    error::{ApiError, ApiResult},
    models::{Message, MessageView},
    realtime::{GatewayState, ServerEvent},
    store::ChatStore,
};

pub const SYSTEM_PROMPT: &str =
    "You are Drift AI, a helper and friendly assistant. Respond only with text \
     and attend to the last user message only.";

/// Prompt fallback for an image sent without a caption.
pub const DESCRIBE_IMAGE_PROMPT: &str = "Describe what you see in the image";

/// How many trailing messages of the chat feed the model.
const CONTEXT_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

/// One turn of model input, provider-agnostic.
#[derive(Debug, Clone)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub text: String,
    pub image_url: Option<String>,
}

impl PromptMessage {
    pub fn text(role: PromptRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            image_url: None,
        }
    }
}

pub type TokenStream = BoxStream<'static, Result<String>>;

/// Seam to the completion provider. The pipeline only ever sees an ordered
/// token stream; provider wire formats stay behind this trait.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn stream(&self, prompt: Vec<PromptMessage>) -> Result<TokenStream>;
}

pub struct AssistantPipeline {
    store: Arc<dyn ChatStore>,
    gateway: Arc<GatewayState>,
    model: Arc<dyn CompletionModel>,
}

impl AssistantPipeline {
    pub fn new(
        store: Arc<dyn ChatStore>,
        gateway: Arc<GatewayState>,
        model: Arc<dyn CompletionModel>,
    ) -> Self {
        Self {
            store,
            gateway,
            model,
        }
    }

    /// Generate and stream a reply to `trigger` into its chat room.
    ///
    /// Chunks go out as `chat:ai` frames to every room member, the sender
    /// included (its optimistic placeholder consumes them). The reply is
    /// persisted only once complete; an all-whitespace completion is dropped
    /// without a terminal frame and yields `None`.
    pub async fn respond(&self, trigger: &Message) -> ApiResult<Option<MessageView>> {
        let ai = self
            .store
            .ai_identity()
            .await?
            .ok_or_else(|| ApiError::NotFound("AI identity not found".to_string()))?;

        let prompt = self.build_prompt(trigger, &ai.id).await?;
        let mut tokens = self.model.stream(prompt).await.map_err(ApiError::Internal)?;

        let chat_id = trigger.chat_id.clone();
        let mut full = String::new();
        while let Some(item) = tokens.next().await {
            let chunk = item.map_err(ApiError::Internal)?;
            if chunk.is_empty() {
                continue;
            }
            full.push_str(&chunk);
            self.gateway.broadcast_room(
                &chat_id,
                ServerEvent::ChatAi {
                    chat_id: chat_id.clone(),
                    chunk: Some(chunk),
                    sender: ai.clone(),
                    done: false,
                    message: None,
                },
                None,
            );
        }

        let text = full.trim();
        if text.is_empty() {
            debug!(chat = %chat_id, "Model produced no content, dropping reply");
            return Ok(None);
        }

        let reply = Message::new(&chat_id, &ai.id, Some(text.to_string()), None, None);
        self.store.insert_message(&reply).await?;
        self.store.set_last_message(&chat_id, &reply.id).await?;
        let view = reply.to_view(ai.clone(), None);

        // Terminal frame carries the persisted message so clients can swap
        // their streaming placeholder for the durable record.
        self.gateway.broadcast_room(
            &chat_id,
            ServerEvent::ChatAi {
                chat_id: chat_id.clone(),
                chunk: None,
                sender: ai,
                done: true,
                message: Some(view.clone()),
            },
            None,
        );
        self.gateway.send_to_user(
            &trigger.sender_id,
            ServerEvent::ChatUpdate {
                chat_id: chat_id.clone(),
                last_message: view.clone(),
            },
        );

        info!(chat = %chat_id, message = %view.id, "Assistant reply persisted");
        Ok(Some(view))
    }

    /// Assemble the trailing context window as provider-agnostic turns.
    async fn build_prompt(&self, trigger: &Message, ai_id: &str) -> ApiResult<Vec<PromptMessage>> {
        let mut prompt = vec![PromptMessage::text(PromptRole::System, SYSTEM_PROMPT)];

        let mut history = self
            .store
            .recent_messages(&trigger.chat_id, CONTEXT_WINDOW)
            .await?;
        // The trigger may not be visible in the store snapshot yet.
        if !history.iter().any(|m| m.id == trigger.id) {
            history.push(trigger.clone());
        }

        for msg in &history {
            let role = if msg.sender_id == ai_id {
                PromptRole::Assistant
            } else {
                PromptRole::User
            };

            let mut text = match &msg.content {
                Some(content) if !content.is_empty() => content.clone(),
                // Image-only message: ask the model to describe it.
                _ if msg.image.is_some() => DESCRIBE_IMAGE_PROMPT.to_string(),
                _ => continue,
            };

            if let Some(reply_id) = &msg.reply_to {
                if let Some(quoted) = self.store.message(reply_id).await? {
                    let excerpt = quoted
                        .content
                        .unwrap_or_else(|| "[image]".to_string());
                    text = format!("[Replying to: \"{excerpt}\"]\n{text}");
                }
            }

            prompt.push(PromptMessage {
                role,
                text,
                image_url: msg.image.clone(),
            });
        }

        Ok(prompt)
    }
}
