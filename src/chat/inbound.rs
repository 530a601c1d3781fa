use serde::Deserialize;
use std::path::PathBuf;

use crate::session::ConversationId;

/// A message delivered by the chat platform
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InboundMessage {
    /// Platform user id of the author
    pub sender: String,
    pub text: String,
    /// Thread the message belongs to; a top-level message starts its own thread
    pub thread_id: String,
    /// `false` for a top-level message, `true` for a reply in a thread
    #[serde(default)]
    pub is_reply: bool,
    /// Local paths of downloaded attachments
    #[serde(default, alias = "attachments")]
    pub files: Vec<PathBuf>,
}

impl InboundMessage {
    pub fn conversation_id(&self) -> ConversationId {
        ConversationId::new(self.thread_id.clone())
    }
}
