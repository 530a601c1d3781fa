//! Display units sent to the chat platform

use serde::Serialize;

/// Slack section text limit is 3000; leave room for markup added by the channel
pub const DEFAULT_MAX_BLOCK_CHARS: usize = 2900;
/// Slack rejects messages with more than 50 blocks
pub const DEFAULT_MAX_BLOCKS: usize = 50;

pub const PLACEHOLDER_TEXT: &str = "⏳ Processing…";
pub const IN_PROGRESS_TEXT: &str = "⏳ _in progress…_";
pub const TRUNCATED_TEXT: &str = "⚠️ _Output truncated: too many blocks to display_";

/// One platform-level renderable chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// Main body text (markdown)
    Section { text: String },
    /// Small secondary text: status lines, reasoning
    Context { text: String },
    Divider,
}

impl Block {
    pub fn section(text: impl Into<String>) -> Self {
        Block::Section { text: text.into() }
    }

    pub fn context(text: impl Into<String>) -> Self {
        Block::Context { text: text.into() }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Block::Section { text } | Block::Context { text } => Some(text),
            Block::Divider => None,
        }
    }

    pub fn placeholder() -> Self {
        Block::context(PLACEHOLDER_TEXT)
    }

    pub fn is_placeholder(&self) -> bool {
        self.text() == Some(PLACEHOLDER_TEXT)
    }

    pub fn is_in_progress(&self) -> bool {
        self.text() == Some(IN_PROGRESS_TEXT)
    }
}

/// Size bounds applied by the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderLimits {
    /// Maximum characters in one block
    pub max_block_chars: usize,
    /// Maximum blocks in one message
    pub max_blocks: usize,
}

impl Default for RenderLimits {
    fn default() -> Self {
        Self {
            max_block_chars: DEFAULT_MAX_BLOCK_CHARS,
            max_blocks: DEFAULT_MAX_BLOCKS,
        }
    }
}

pub fn error_banner(message: &str) -> Block {
    Block::section(format!("❌ *Error:* {}", message))
}

pub fn exit_code_banner(exit_code: i32) -> Block {
    Block::section(format!(
        "⚠️ opencode exited with code {} without producing output",
        exit_code
    ))
}

/// Keep at most `limits.max_blocks`, replacing the overflow with a notice
pub fn enforce_block_limit(mut blocks: Vec<Block>, limits: &RenderLimits) -> Vec<Block> {
    let max = limits.max_blocks.max(1);
    if blocks.len() > max {
        blocks.truncate(max - 1);
        blocks.push(Block::context(TRUNCATED_TEXT));
    }
    blocks
}

/// Plain-text rendering for terminals and logs
pub fn to_plain_text(blocks: &[Block]) -> String {
    blocks
        .iter()
        .map(|block| match block {
            Block::Section { text } | Block::Context { text } => text.clone(),
            Block::Divider => "───".to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_like_block_kit() {
        let json = serde_json::to_value(vec![Block::section("hi"), Block::Divider]).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{"type": "section", "text": "hi"}, {"type": "divider"}])
        );
    }

    #[test]
    fn test_enforce_block_limit() {
        let limits = RenderLimits {
            max_block_chars: 100,
            max_blocks: 3,
        };
        let blocks: Vec<Block> = (0..5).map(|i| Block::section(i.to_string())).collect();

        let limited = enforce_block_limit(blocks, &limits);
        assert_eq!(limited.len(), 3);
        assert_eq!(limited[1], Block::section("1"));
        assert_eq!(limited[2].text(), Some(TRUNCATED_TEXT));

        let short = vec![Block::section("a"), Block::section("b"), Block::section("c")];
        assert_eq!(enforce_block_limit(short.clone(), &limits), short);
    }
}
