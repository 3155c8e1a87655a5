//! Durable local cache behind the reconciling store.
//!
//! The store reads the cache to paint instantly on chat open, then overwrites
//! it from server fetches. Production targets back this with an on-device
//! database; `MemoryCache` backs tests and headless use.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::models::{ChatSummary, MessageRecord};

pub trait LocalCache: Send + Sync {
    fn messages(&self, chat_id: &str) -> Vec<MessageRecord>;

    /// Replace the cached message list for one chat.
    fn put_messages(&self, chat_id: &str, messages: &[MessageRecord]);

    fn chats(&self) -> Vec<ChatSummary>;

    fn put_chats(&self, chats: &[ChatSummary]);
}

#[derive(Default)]
pub struct MemoryCache {
    messages: RwLock<HashMap<String, Vec<MessageRecord>>>,
    chats: RwLock<Vec<ChatSummary>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalCache for MemoryCache {
    fn messages(&self, chat_id: &str) -> Vec<MessageRecord> {
        self.messages
            .read()
            .get(chat_id)
            .cloned()
            .unwrap_or_default()
    }

    fn put_messages(&self, chat_id: &str, messages: &[MessageRecord]) {
        self.messages
            .write()
            .insert(chat_id.to_string(), messages.to_vec());
    }

    fn chats(&self) -> Vec<ChatSummary> {
        self.chats.read().clone()
    }

    fn put_chats(&self, chats: &[ChatSummary]) {
        *self.chats.write() = chats.to_vec();
    }
}
