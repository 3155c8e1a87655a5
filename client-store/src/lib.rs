//! Client-side chat state for driftchat UIs: a cache-backed reconciling
//! message store, optimistic sends with stream-aware dedupe, and the typing
//! indicator debounce.

pub mod cache;
pub mod models;
pub mod store;
pub mod typing;

pub use cache::{LocalCache, MemoryCache};
pub use models::{ChatSummary, Delivery, Draft, MessageRecord, ReplyRef, UserRef};
pub use store::{PendingSend, ReconcilingStore, ASSISTANT_ERROR_TEXT};
pub use typing::{typing_monitor, TypingSignal, TypingState, TYPING_IDLE};
