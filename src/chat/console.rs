//! JSON-lines chat transport over stdio

use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use super::{ChannelError, ChatChannel, MessageRef};
use crate::render::Block;
use crate::session::ConversationId;

#[derive(Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Outbound<'a> {
    Post {
        thread_id: &'a ConversationId,
        message_id: &'a str,
        blocks: &'a [Block],
    },
    Update {
        thread_id: &'a ConversationId,
        message_id: &'a str,
        blocks: &'a [Block],
    },
}

/// Writes one JSON object per post or update to the wrapped writer
pub struct ConsoleChannel<W> {
    writer: Mutex<W>,
    next_id: AtomicU64,
}

impl ConsoleChannel<tokio::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W> ConsoleChannel<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    async fn write_record(&self, record: &Outbound<'_>) -> Result<(), ChannelError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl<W> ChatChannel for ConsoleChannel<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn post_message(
        &self,
        thread: &ConversationId,
        blocks: &[Block],
    ) -> Result<MessageRef, ChannelError> {
        let message_id = format!("m{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        self.write_record(&Outbound::Post {
            thread_id: thread,
            message_id: &message_id,
            blocks,
        })
        .await?;

        Ok(MessageRef {
            thread_id: thread.clone(),
            message_id,
        })
    }

    async fn update_message(
        &self,
        message: &MessageRef,
        blocks: &[Block],
    ) -> Result<(), ChannelError> {
        self.write_record(&Outbound::Update {
            thread_id: &message.thread_id,
            message_id: &message.message_id,
            blocks,
        })
        .await
    }
}
