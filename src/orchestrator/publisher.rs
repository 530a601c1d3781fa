//! Publishing one run's render as a single message, updated in place

use std::time::Duration;

use crate::chat::{ChannelError, ChatChannel, MessageRef};
use crate::render::Block;
use crate::session::ConversationId;

/// Wait before the single retry of a final publish when the platform gave no hint
const FINAL_RETRY_DELAY: Duration = Duration::from_secs(1);

pub struct Publisher<'a> {
    channel: &'a dyn ChatChannel,
    thread: &'a ConversationId,
    message: Option<MessageRef>,
    published: usize,
}

impl<'a> Publisher<'a> {
    pub fn new(channel: &'a dyn ChatChannel, thread: &'a ConversationId) -> Self {
        Self {
            channel,
            thread,
            message: None,
            published: 0,
        }
    }

    pub fn message(&self) -> Option<&MessageRef> {
        self.message.as_ref()
    }

    pub fn published(&self) -> usize {
        self.published
    }

    /// Post on first use, update the same message afterwards
    pub async fn publish(&mut self, blocks: &[Block]) -> Result<(), ChannelError> {
        match &self.message {
            Some(message) => self.channel.update_message(message, blocks).await?,
            None => self.message = Some(self.channel.post_message(self.thread, blocks).await?),
        }
        self.published += 1;
        Ok(())
    }

    /// Periodic publish: failures are logged and the next tick tries again.
    /// Returns whether the blocks reached the channel.
    pub async fn publish_progress(&mut self, blocks: &[Block]) -> bool {
        match self.publish(blocks).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Skipping progress update: {}", e);
                false
            }
        }
    }

    /// Final publish: one retry on a transient failure, then give up loudly
    pub async fn publish_final(&mut self, blocks: &[Block]) {
        let err = match self.publish(blocks).await {
            Ok(()) => return,
            Err(e) => e,
        };

        if !err.is_transient() {
            tracing::error!("Failed to publish final render: {}", err);
            return;
        }

        let delay = match &err {
            ChannelError::RateLimited {
                retry_after: Some(delay),
            } => *delay,
            _ => FINAL_RETRY_DELAY,
        };
        tracing::warn!("Final render rejected ({}), retrying in {:?}", err, delay);
        tokio::time::sleep(delay).await;

        if let Err(e) = self.publish(blocks).await {
            tracing::error!("Failed to publish final render after retry: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{OpKind, RecordingChannel};

    #[tokio::test]
    async fn test_posts_once_then_updates() {
        let channel = RecordingChannel::new();
        let thread = ConversationId::from("t");
        let mut publisher = Publisher::new(&channel, &thread);

        publisher.publish_progress(&[Block::placeholder()]).await;
        publisher.publish_progress(&[Block::section("a")]).await;
        publisher.publish_final(&[Block::section("ab")]).await;

        let kinds: Vec<OpKind> = channel.ops().iter().map(|op| op.kind).collect();
        assert_eq!(kinds, vec![OpKind::Post, OpKind::Update, OpKind::Update]);
        assert_eq!(publisher.published(), 3);
        assert_eq!(
            channel.current(publisher.message().unwrap()),
            Some(vec![Block::section("ab")])
        );
    }

    #[tokio::test]
    async fn test_progress_failure_is_skipped_and_final_retries() {
        let channel = RecordingChannel::new();
        let thread = ConversationId::from("t");
        let mut publisher = Publisher::new(&channel, &thread);
        publisher.publish_progress(&[Block::placeholder()]).await;

        channel.fail_updates(1);
        publisher.publish_progress(&[Block::section("lost")]).await;
        assert_eq!(publisher.published(), 1);

        channel.fail_updates(1);
        publisher.publish_final(&[Block::section("final")]).await;
        assert_eq!(channel.rejected(), 2);
        assert_eq!(
            channel.current(publisher.message().unwrap()),
            Some(vec![Block::section("final")])
        );
    }
}
