//! Optimistic send/receive reconciliation for the open chat.
//!
//! Every mutation funnels through `apply_or_insert`, which dedupes first by
//! the local temp id, then by the server id, so a message that arrives twice
//! (terminal stream frame plus HTTP response, or broadcast plus refetch)
//! lands exactly once and in place.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::cache::LocalCache;
use crate::models::{ChatSummary, Delivery, Draft, MessageRecord, UserRef};

/// Shown in place of an assistant reply when the send fails mid-exchange.
pub const ASSISTANT_ERROR_TEXT: &str = "Something went wrong. Please try again.";

/// Handle for one in-flight send, used to reconcile the HTTP response.
#[derive(Debug, Clone)]
pub struct PendingSend {
    pub user_temp_id: String,
    pub assistant_temp_id: Option<String>,
}

#[derive(Default)]
struct Inner {
    open_chat: Option<String>,
    messages: Vec<MessageRecord>,
    chats: Vec<ChatSummary>,
    /// Temp id of the assistant bubble currently receiving chunks.
    open_stream: Option<String>,
}

pub struct ReconcilingStore {
    cache: Arc<dyn LocalCache>,
    inner: RwLock<Inner>,
}

impl ReconcilingStore {
    pub fn new(cache: Arc<dyn LocalCache>) -> Self {
        let chats = cache.chats();
        Self {
            cache,
            inner: RwLock::new(Inner {
                chats,
                ..Inner::default()
            }),
        }
    }

    /// Open a chat: paint from the cache immediately, server fetch follows.
    pub fn open_chat(&self, chat_id: &str) -> Vec<MessageRecord> {
        let mut inner = self.inner.write();
        inner.open_chat = Some(chat_id.to_string());
        inner.open_stream = None;
        inner.messages = self.cache.messages(chat_id);
        inner.messages.clone()
    }

    pub fn close_chat(&self) {
        let mut inner = self.inner.write();
        inner.open_chat = None;
        inner.open_stream = None;
        inner.messages.clear();
    }

    /// Apply a server fetch. The fetched history wins, but local sends the
    /// server has not acknowledged yet are carried over.
    pub fn apply_fetch(&self, chat_id: &str, fetched: Vec<MessageRecord>) {
        let mut inner = self.inner.write();
        if inner.open_chat.as_deref() != Some(chat_id) {
            debug!(chat = %chat_id, "Fetch for a chat that is no longer open, ignoring");
            return;
        }
        let mut merged = fetched;
        let unacked: Vec<MessageRecord> = inner
            .messages
            .iter()
            .filter(|m| m.status != Delivery::Sent && !merged.iter().any(|f| f.id == m.id))
            .cloned()
            .collect();
        merged.extend(unacked);
        inner.messages = merged;
        self.cache.put_messages(chat_id, &inner.messages);
    }

    /// Insert the optimistic records for a send: the user's message, plus an
    /// empty streaming bubble when an assistant reply is expected. At most one
    /// streaming bubble is open per chat; a second send while one is open
    /// only creates the user record.
    pub fn begin_send(
        &self,
        sender: UserRef,
        assistant: Option<UserRef>,
        draft: Draft,
    ) -> Option<PendingSend> {
        let mut inner = self.inner.write();
        let chat_id = inner.open_chat.clone()?;

        let user_temp_id = format!("temp-{}", Uuid::new_v4());
        inner.messages.push(MessageRecord {
            id: user_temp_id.clone(),
            chat_id: chat_id.clone(),
            sender,
            content: draft.content,
            image: draft.image,
            reply_to: draft.reply_to,
            created_at: Utc::now(),
            status: Delivery::Pending,
            streaming: false,
        });

        let assistant_temp_id = match assistant {
            Some(ai) if inner.open_stream.is_none() => {
                let temp_id = format!("temp-ai-{}", Uuid::new_v4());
                inner.messages.push(MessageRecord {
                    id: temp_id.clone(),
                    chat_id,
                    sender: ai,
                    content: Some(String::new()),
                    image: None,
                    reply_to: None,
                    created_at: Utc::now(),
                    status: Delivery::Pending,
                    streaming: true,
                });
                inner.open_stream = Some(temp_id.clone());
                Some(temp_id)
            }
            _ => None,
        };

        Some(PendingSend {
            user_temp_id,
            assistant_temp_id,
        })
    }

    /// Land a server-confirmed record: replace the matching temp record in
    /// place, else replace an existing record with the same id, else append.
    pub fn apply_or_insert(&self, record: MessageRecord, temp_id: Option<&str>) {
        let mut inner = self.inner.write();
        if inner.open_chat.as_deref() != Some(record.chat_id.as_str()) {
            debug!(chat = %record.chat_id, "Message for a chat that is not open, ignoring");
            return;
        }
        if let Some(tid) = temp_id {
            if inner.open_stream.as_deref() == Some(tid) {
                inner.open_stream = None;
            }
        }
        Self::place(&mut inner.messages, record, temp_id);
        self.write_through(&inner);
    }

    /// Append one streamed chunk to the open assistant bubble, creating it
    /// first on receiver clients that never called `begin_send`.
    pub fn apply_chunk(&self, chat_id: &str, sender: UserRef, chunk: &str) {
        let mut inner = self.inner.write();
        if inner.open_chat.as_deref() != Some(chat_id) {
            return;
        }
        let temp_id = match inner.open_stream.clone() {
            Some(id) => id,
            None => {
                let temp_id = format!("temp-ai-{}", Uuid::new_v4());
                inner.messages.push(MessageRecord {
                    id: temp_id.clone(),
                    chat_id: chat_id.to_string(),
                    sender,
                    content: Some(String::new()),
                    image: None,
                    reply_to: None,
                    created_at: Utc::now(),
                    status: Delivery::Pending,
                    streaming: true,
                });
                inner.open_stream = Some(temp_id.clone());
                temp_id
            }
        };
        if let Some(bubble) = inner.messages.iter_mut().find(|m| m.id == temp_id) {
            bubble.content.get_or_insert_with(String::new).push_str(chunk);
        }
    }

    /// Swap the streaming bubble for the persisted assistant message.
    pub fn apply_terminal(&self, message: MessageRecord) {
        let temp_id = {
            let mut inner = self.inner.write();
            if inner.open_chat.as_deref() != Some(message.chat_id.as_str()) {
                return;
            }
            inner.open_stream.take()
        };
        self.apply_or_insert(message, temp_id.as_deref());
    }

    /// Reconcile the HTTP response of a send. Safe to call after the
    /// socket events already landed; dedupe keeps everything single.
    pub fn reconcile_send(
        &self,
        pending: &PendingSend,
        user_message: MessageRecord,
        ai_response: Option<MessageRecord>,
    ) {
        self.apply_or_insert(user_message, Some(&pending.user_temp_id));
        match (ai_response, &pending.assistant_temp_id) {
            (Some(reply), Some(temp_id)) => self.apply_or_insert(reply, Some(temp_id)),
            (Some(reply), None) => self.apply_or_insert(reply, None),
            // The exchange ended without a reply; the bubble becomes a
            // visible error rather than silently disappearing.
            (None, Some(temp_id)) => {
                let mut inner = self.inner.write();
                Self::rewrite_bubble(&mut inner, temp_id);
                self.write_through(&inner);
            }
            (None, None) => {}
        }
    }

    /// Mark a send as failed and rewrite its assistant bubble, if any, into
    /// an inline error so the stream does not dangle.
    pub fn fail_send(&self, pending: &PendingSend) {
        let mut inner = self.inner.write();
        if let Some(msg) = inner
            .messages
            .iter_mut()
            .find(|m| m.id == pending.user_temp_id)
        {
            msg.status = Delivery::Failed;
        }
        if let Some(temp_id) = &pending.assistant_temp_id {
            Self::rewrite_bubble(&mut inner, temp_id);
        }
    }

    /// Turn an open assistant bubble into a settled inline error.
    fn rewrite_bubble(inner: &mut Inner, temp_id: &str) {
        if let Some(bubble) = inner.messages.iter_mut().find(|m| m.id == temp_id) {
            bubble.content = Some(ASSISTANT_ERROR_TEXT.to_string());
            bubble.streaming = false;
            bubble.status = Delivery::Failed;
        }
        if inner.open_stream.as_deref() == Some(temp_id) {
            inner.open_stream = None;
        }
    }

    /// Add or refresh a chat and move it to the front of the list.
    pub fn upsert_chat(&self, chat: ChatSummary) {
        let mut inner = self.inner.write();
        inner.chats.retain(|c| c.id != chat.id);
        inner.chats.insert(0, chat);
        self.cache.put_chats(&inner.chats);
    }

    /// Apply a chat-list update: new last message, chat bubbles to the top.
    pub fn update_chat_last_message(&self, chat_id: &str, message: MessageRecord) {
        let mut inner = self.inner.write();
        let Some(pos) = inner.chats.iter().position(|c| c.id == chat_id) else {
            debug!(chat = %chat_id, "Update for an unknown chat, ignoring");
            return;
        };
        let mut chat = inner.chats.remove(pos);
        chat.last_message = Some(message);
        inner.chats.insert(0, chat);
        self.cache.put_chats(&inner.chats);
    }

    pub fn messages(&self) -> Vec<MessageRecord> {
        self.inner.read().messages.clone()
    }

    pub fn chats(&self) -> Vec<ChatSummary> {
        self.inner.read().chats.clone()
    }

    pub fn open_stream_id(&self) -> Option<String> {
        self.inner.read().open_stream.clone()
    }

    fn place(messages: &mut Vec<MessageRecord>, record: MessageRecord, temp_id: Option<&str>) {
        if let Some(tid) = temp_id {
            if let Some(pos) = messages.iter().position(|m| m.id == tid) {
                messages[pos] = record;
                return;
            }
        }
        if let Some(pos) = messages.iter().position(|m| m.id == record.id) {
            messages[pos] = record;
        } else {
            messages.push(record);
        }
    }

    fn write_through(&self, inner: &Inner) {
        if let Some(chat_id) = &inner.open_chat {
            self.cache.put_messages(chat_id, &inner.messages);
        }
    }
}
