//! Conversation state
//!
//! One [`ConversationContext`] per chat thread, kept in process memory by a
//! [`ConversationStore`]. Nothing here survives a restart.

pub mod context;
pub mod store;

pub use context::{
    ContextPatch, ConversationContext, ConversationId, PendingRequest, RunPhase, SettingsChange,
};
pub use store::ConversationStore;
