//! Folds the event stream of one run into a renderable document

use super::blocks::{enforce_block_limit, Block, RenderLimits, IN_PROGRESS_TEXT};
use super::format::{tool_blocks, usage_line};
use super::split::split_text;
use crate::opencode::{RunEvent, ToolCall, Usage};

/// Prefix for reasoning blocks
const THINKING_PREFIX: &str = "💭 ";

/// A finalized, immutable part of the document
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(String),
    Tool(ToolCall),
    Thinking(String),
}

/// Document state for one run.
///
/// `push` only mutates; `render` is a pure function of the current state.
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    segments: Vec<Segment>,
    current: String,
    steps: u32,
    usage: Option<Usage>,
    finished: bool,
    limits: RenderLimits,
}

impl Accumulator {
    pub fn new(limits: RenderLimits) -> Self {
        Self {
            limits,
            ..Default::default()
        }
    }

    pub fn push(&mut self, event: RunEvent) {
        match event {
            RunEvent::StepStart => {
                self.steps += 1;
                if self.steps > 1 {
                    self.flush_text();
                }
            }
            RunEvent::TextDelta(fragment) => self.current.push_str(&fragment),
            RunEvent::ToolUse(call) => {
                self.flush_text();
                self.segments.push(Segment::Tool(call));
            }
            RunEvent::Thinking(text) => {
                self.flush_text();
                self.segments.push(Segment::Thinking(text));
            }
            RunEvent::StepFinish { reason, usage } => {
                if usage.is_some() {
                    self.usage = usage;
                }
                if reason.as_deref() == Some("stop") {
                    self.finished = true;
                }
            }
            RunEvent::Other(kind) => tracing::trace!("Ignoring {} event", kind),
        }
    }

    fn flush_text(&mut self) {
        if !self.current.is_empty() {
            self.segments.push(Segment::Text(std::mem::take(&mut self.current)));
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn pending_text(&self) -> &str {
        &self.current
    }

    pub fn step_count(&self) -> u32 {
        self.steps
    }

    pub fn usage(&self) -> Option<&Usage> {
        self.usage.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Whether anything beyond status lines would be rendered
    pub fn has_content(&self) -> bool {
        self.segments.iter().any(|segment| match segment {
            Segment::Text(text) | Segment::Thinking(text) => !text.trim().is_empty(),
            Segment::Tool(_) => true,
        }) || !self.current.trim().is_empty()
    }

    /// Content blocks only, without the trailing status line
    pub fn render_content(&self) -> Vec<Block> {
        let max = self.limits.max_block_chars;
        let mut blocks = Vec::new();

        for segment in &self.segments {
            match segment {
                Segment::Text(text) => push_text(&mut blocks, text, max),
                Segment::Tool(call) => blocks.extend(tool_blocks(call, max)),
                Segment::Thinking(text) => {
                    let budget = max.saturating_sub(THINKING_PREFIX.chars().count());
                    blocks.extend(
                        split_text(text.trim(), budget)
                            .into_iter()
                            .map(|chunk| Block::context(format!("{}{}", THINKING_PREFIX, chunk))),
                    );
                }
            }
        }
        push_text(&mut blocks, &self.current, max);
        blocks
    }

    pub fn render(&self) -> Vec<Block> {
        let mut blocks = self.render_content();

        if !self.finished {
            if !blocks.is_empty() {
                blocks.push(Block::context(IN_PROGRESS_TEXT));
            }
        } else if let Some(usage) = &self.usage {
            blocks.push(Block::context(usage_line(usage)));
        }

        if blocks.is_empty() {
            return vec![Block::placeholder()];
        }
        enforce_block_limit(blocks, &self.limits)
    }
}

fn push_text(blocks: &mut Vec<Block>, text: &str, max: usize) {
    if text.trim().is_empty() {
        return;
    }
    blocks.extend(split_text(text, max).into_iter().map(Block::section));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opencode::ToolStatus;
    use crate::render::blocks::{PLACEHOLDER_TEXT, TRUNCATED_TEXT};
    use serde_json::json;

    fn text(s: &str) -> RunEvent {
        RunEvent::TextDelta(s.to_string())
    }

    fn stop(usage: Option<Usage>) -> RunEvent {
        RunEvent::StepFinish {
            reason: Some("stop".to_string()),
            usage,
        }
    }

    fn bash(command: &str) -> RunEvent {
        RunEvent::ToolUse(ToolCall {
            call_id: "call_1".to_string(),
            tool: "bash".to_string(),
            title: None,
            status: ToolStatus::Running,
            input: json!({ "command": command }),
            output: None,
        })
    }

    fn fed(events: Vec<RunEvent>) -> Accumulator {
        let mut acc = Accumulator::new(RenderLimits::default());
        for event in events {
            acc.push(event);
        }
        acc
    }

    #[test]
    fn test_text_then_usage() {
        let acc = fed(vec![
            RunEvent::StepStart,
            text("hi "),
            text("there"),
            stop(Some(Usage {
                input: 10,
                output: 5,
                ..Default::default()
            })),
        ]);

        let blocks = acc.render();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0], Block::section("hi there"));
        let status = blocks[1].text().unwrap();
        assert!(status.contains("10") && status.contains('5'));
        assert!(blocks.iter().all(|b| b.text() != Some(IN_PROGRESS_TEXT)));
        assert!(acc.is_finished());
    }

    #[test]
    fn test_running_shell_tool() {
        let acc = fed(vec![RunEvent::StepStart, bash("ls -la")]);
        let blocks = acc.render();

        assert!(blocks[0].text().unwrap().contains("bash"));
        assert!(blocks[1].text().unwrap().contains("ls -la"));
        assert_eq!(blocks[2], Block::Divider);
        assert_eq!(blocks[3].text(), Some(IN_PROGRESS_TEXT));
        assert_eq!(blocks.len(), 4);
    }

    #[test]
    fn test_flush_points_preserve_order() {
        let acc = fed(vec![
            RunEvent::StepStart,
            text("first"),
            RunEvent::Thinking("hmm".to_string()),
            text("second"),
            RunEvent::StepStart,
            text("third"),
            bash("pwd"),
        ]);

        assert_eq!(
            acc.segments()
                .iter()
                .map(|s| match s {
                    Segment::Text(t) => t.clone(),
                    Segment::Thinking(t) => format!("thinking:{}", t),
                    Segment::Tool(c) => format!("tool:{}", c.tool),
                })
                .collect::<Vec<_>>(),
            vec!["first", "thinking:hmm", "second", "third", "tool:bash"]
        );
        assert_eq!(acc.step_count(), 2);
        assert_eq!(acc.pending_text(), "");
    }

    #[test]
    fn test_first_step_start_does_not_flush() {
        let acc = fed(vec![text("early "), RunEvent::StepStart, text("late")]);
        assert!(acc.segments().is_empty());
        assert_eq!(acc.pending_text(), "early late");
    }

    #[test]
    fn test_replay_is_deterministic_and_render_idempotent() {
        let events = vec![
            RunEvent::StepStart,
            text("a"),
            bash("ls"),
            RunEvent::Thinking("b".to_string()),
            RunEvent::StepStart,
            text("c"),
            stop(None),
        ];

        let mut acc = Accumulator::new(RenderLimits::default());
        let mut seen = Vec::new();
        for event in events.clone() {
            acc.push(event);
            let now = acc.segments().to_vec();
            assert!(now.starts_with(&seen));
            seen = now;
        }

        let replayed = fed(events);
        assert_eq!(replayed.segments(), acc.segments());
        assert_eq!(acc.render(), acc.render());
        assert_eq!(replayed.render(), acc.render());
    }

    #[test]
    fn test_usage_last_wins_and_finished_is_sticky() {
        let acc = fed(vec![
            RunEvent::StepStart,
            RunEvent::StepFinish {
                reason: Some("tool-calls".to_string()),
                usage: Some(Usage {
                    input: 1,
                    ..Default::default()
                }),
            },
            stop(Some(Usage {
                input: 2,
                ..Default::default()
            })),
            RunEvent::StepStart,
            RunEvent::StepFinish {
                reason: Some("tool-calls".to_string()),
                usage: None,
            },
        ]);

        assert_eq!(acc.usage().map(|u| u.input), Some(2));
        assert!(acc.is_finished());
    }

    #[test]
    fn test_empty_document_renders_placeholder() {
        let acc = Accumulator::new(RenderLimits::default());
        assert_eq!(acc.render(), vec![Block::placeholder()]);
        assert!(!acc.has_content());

        let acc = fed(vec![RunEvent::StepStart, text("  \n")]);
        assert_eq!(acc.render()[0].text(), Some(PLACEHOLDER_TEXT));

        let acc = fed(vec![stop(None)]);
        assert_eq!(acc.render(), vec![Block::placeholder()]);
    }

    #[test]
    fn test_long_text_is_split() {
        let limits = RenderLimits {
            max_block_chars: 10,
            max_blocks: 50,
        };
        let mut acc = Accumulator::new(limits);
        acc.push(text(&"y".repeat(35)));
        acc.push(stop(None));

        let blocks = acc.render();
        assert_eq!(blocks.len(), 4);
        let joined: String = blocks.iter().filter_map(Block::text).collect();
        assert_eq!(joined, "y".repeat(35));
    }

    #[test]
    fn test_block_limit_appends_truncation_notice() {
        let limits = RenderLimits {
            max_block_chars: 100,
            max_blocks: 5,
        };
        let mut acc = Accumulator::new(limits);
        for i in 0..10 {
            acc.push(RunEvent::Thinking(format!("thought {}", i)));
        }

        let blocks = acc.render();
        assert_eq!(blocks.len(), 5);
        assert_eq!(blocks[4].text(), Some(TRUNCATED_TEXT));
        assert_eq!(blocks[0].text(), Some("💭 thought 0"));
    }
}
