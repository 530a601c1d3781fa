//! The chat platform seam
//!
//! The relay needs only two outbound primitives (post a message, update it in
//! place) and one inbound shape. [`ConsoleChannel`] implements them over JSON
//! lines on stdio.

pub mod console;
pub mod directives;
pub mod inbound;

pub use console::ConsoleChannel;
pub use directives::{parse_message, BridgeCommand, ParsedMessage};
pub use inbound::InboundMessage;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::error::{ErrorCode, RelayError};
use crate::render::Block;
use crate::session::ConversationId;

/// Identifies a posted message so it can be updated later
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub thread_id: ConversationId,
    pub message_id: String,
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Rate limited by chat platform (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Message not found: {0}")]
    NotFound(String),

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ChannelError {
    /// Whether a later attempt with fresh state may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, ChannelError::RateLimited { .. } | ChannelError::Transport(_))
    }
}

impl From<ChannelError> for RelayError {
    fn from(err: ChannelError) -> Self {
        let code = match &err {
            ChannelError::RateLimited { .. } => ErrorCode::CHANNEL_RATE_LIMITED,
            ChannelError::NotFound(_) => ErrorCode::CHANNEL_NOT_FOUND,
            ChannelError::Transport(_) | ChannelError::Io(_) => ErrorCode::CHANNEL_TRANSPORT,
            ChannelError::Json(_) => ErrorCode::CHANNEL_GENERIC,
        };
        RelayError::channel(code, err.to_string()).with_source(err)
    }
}

/// Outbound side of a chat platform
#[async_trait]
pub trait ChatChannel: Send + Sync {
    /// Post a new message in `thread`
    async fn post_message(
        &self,
        thread: &ConversationId,
        blocks: &[Block],
    ) -> Result<MessageRef, ChannelError>;

    /// Replace the content of a previously posted message
    async fn update_message(&self, message: &MessageRef, blocks: &[Block])
        -> Result<(), ChannelError>;

    /// Post a single line of plain text
    async fn post_text(
        &self,
        thread: &ConversationId,
        text: &str,
    ) -> Result<MessageRef, ChannelError> {
        self.post_message(thread, &[Block::section(text)]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_error_codes() {
        let err: RelayError = ChannelError::RateLimited {
            retry_after: Some(Duration::from_secs(3)),
        }
        .into();
        assert_eq!(err.code(), ErrorCode::CHANNEL_RATE_LIMITED);

        let err: RelayError = ChannelError::NotFound("m1".to_string()).into();
        assert_eq!(err.code(), ErrorCode::CHANNEL_NOT_FOUND);
    }

    #[test]
    fn test_transient_errors() {
        assert!(ChannelError::Transport("reset".into()).is_transient());
        assert!(!ChannelError::NotFound("m1".into()).is_transient());
    }
}
