//! Gemini-backed `CompletionModel` via the `genai` client.
//!
//! Credentials come from the provider's own environment variables
//! (`GEMINI_API_KEY` for the default model).

use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use genai::chat::{ChatMessage, ChatRequest, ChatStreamEvent, ContentPart};
use genai::Client;

use super::{CompletionModel, PromptMessage, PromptRole, TokenStream};

pub struct GeminiModel {
    client: Client,
    model: String,
}

impl GeminiModel {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: Client::default(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl CompletionModel for GeminiModel {
    async fn stream(&self, prompt: Vec<PromptMessage>) -> Result<TokenStream> {
        let mut messages = Vec::with_capacity(prompt.len());
        for turn in prompt {
            let message = match turn.role {
                PromptRole::System => ChatMessage::system(turn.text),
                PromptRole::Assistant => ChatMessage::assistant(turn.text),
                PromptRole::User => match turn.image_url {
                    Some(url) => ChatMessage::user(vec![
                        ContentPart::from_text(turn.text),
                        ContentPart::from_binary_url("image/jpeg", url, None),
                    ]),
                    None => ChatMessage::user(turn.text),
                },
            };
            messages.push(message);
        }

        let request = ChatRequest::new(messages);
        let response = self
            .client
            .exec_chat_stream(&self.model, request, None)
            .await?;

        let tokens = response.stream.filter_map(|item| async move {
            match item {
                Ok(ChatStreamEvent::Chunk(chunk)) => Some(Ok(chunk.content)),
                Ok(_) => None,
                Err(e) => Some(Err(anyhow::Error::from(e))),
            }
        });
        Ok(Box::pin(tokens))
    }
}
