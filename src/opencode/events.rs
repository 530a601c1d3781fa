//! Typed view of the `opencode run --format json` event stream
//!
//! Each stdout line is one [`WireEvent`]: a `type` discriminator, an optional
//! session id and a `part` payload whose shape depends on the type. The wire
//! form is kept loose (unknown fields and types are tolerated) and converted
//! into the closed [`RunEvent`] enum the renderer works with.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One decoded stdout line, before interpretation
#[derive(Debug, Clone, Deserialize)]
pub struct WireEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(
        default,
        rename = "sessionID",
        alias = "sessionId",
        alias = "session_id"
    )]
    pub session_id: Option<String>,
    #[serde(default)]
    pub part: Value,
}

impl WireEvent {
    /// Session id from the envelope, falling back to the one nested in `part`
    pub fn session_id(&self) -> Option<&str> {
        self.session_id
            .as_deref()
            .or_else(|| {
                ["sessionID", "sessionId", "session_id"]
                    .iter()
                    .find_map(|key| self.part.get(*key).and_then(Value::as_str))
            })
            .filter(|id| !id.is_empty())
    }

    pub fn into_event(self) -> RunEvent {
        RunEvent::from_wire(self)
    }
}

/// Lifecycle of a single tool invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Running,
    Completed,
    Failed,
}

impl ToolStatus {
    /// `running` unless the wire says `completed`; `error`/`failed` are kept apart
    fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("completed") => ToolStatus::Completed,
            Some("error") | Some("failed") => ToolStatus::Failed,
            _ => ToolStatus::Running,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub call_id: String,
    pub tool: String,
    pub title: Option<String>,
    pub status: ToolStatus,
    pub input: Value,
    pub output: Option<String>,
}

/// Token and cost accounting reported at the end of a step
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Usage {
    pub input: u64,
    pub output: u64,
    pub reasoning: u64,
    pub cache_read: u64,
    pub cache_write: u64,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    StepStart,
    TextDelta(String),
    ToolUse(ToolCall),
    Thinking(String),
    StepFinish {
        reason: Option<String>,
        usage: Option<Usage>,
    },
    /// An event type the renderer has no rule for
    Other(String),
}

#[derive(Debug, Default, Deserialize)]
struct ToolPart {
    #[serde(default, rename = "callID", alias = "callId", alias = "id")]
    call_id: Option<String>,
    #[serde(default, alias = "name")]
    tool: Option<String>,
    #[serde(default)]
    state: Option<ToolState>,
    #[serde(flatten)]
    flat: ToolState,
}

#[derive(Debug, Default, Deserialize)]
struct ToolState {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    input: Option<Value>,
    #[serde(default)]
    output: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct StepFinishPart {
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    cost: Option<f64>,
    #[serde(default)]
    tokens: Option<Tokens>,
}

#[derive(Debug, Default, Deserialize)]
struct Tokens {
    #[serde(default)]
    input: u64,
    #[serde(default)]
    output: u64,
    #[serde(default)]
    reasoning: u64,
    #[serde(default)]
    cache: CacheTokens,
}

#[derive(Debug, Default, Deserialize)]
struct CacheTokens {
    #[serde(default)]
    read: u64,
    #[serde(default)]
    write: u64,
}

impl RunEvent {
    pub fn from_wire(wire: WireEvent) -> Self {
        match wire.kind.as_str() {
            "step_start" | "step-start" => RunEvent::StepStart,
            "text" | "text-delta" | "text_delta" => RunEvent::TextDelta(text_of(&wire.part)),
            "tool_use" | "tool-use" | "tool" => RunEvent::ToolUse(tool_call(wire.part)),
            "reasoning" | "thinking" => RunEvent::Thinking(text_of(&wire.part)),
            "step_finish" | "step-finish" => step_finish(wire.part),
            _ => RunEvent::Other(wire.kind),
        }
    }
}

/// Text carried by a text or reasoning part; `delta` wins over the full `text`
fn text_of(part: &Value) -> String {
    part.get("delta")
        .and_then(Value::as_str)
        .or_else(|| part.get("text").and_then(Value::as_str))
        .unwrap_or_default()
        .to_string()
}

fn tool_call(part: Value) -> ToolCall {
    let part: ToolPart = serde_json::from_value(part).unwrap_or_default();
    let state = part.state.unwrap_or_default();
    let flat = part.flat;

    let status = ToolStatus::parse(state.status.as_deref().or(flat.status.as_deref()));
    let output = match status {
        ToolStatus::Running => None,
        _ => state.output.or(flat.output).map(output_text),
    };

    ToolCall {
        call_id: part.call_id.unwrap_or_default(),
        tool: part.tool.unwrap_or_else(|| "tool".to_string()),
        title: state.title.or(flat.title).filter(|t| !t.is_empty()),
        status,
        input: state.input.or(flat.input).unwrap_or(Value::Null),
        output,
    }
}

fn output_text(output: Value) -> String {
    match output {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => serde_json::to_string_pretty(&other).unwrap_or_default(),
    }
}

fn step_finish(part: Value) -> RunEvent {
    let part: StepFinishPart = serde_json::from_value(part).unwrap_or_default();
    let usage = match (&part.tokens, part.cost) {
        (None, None) => None,
        (tokens, cost) => {
            let tokens = tokens.as_ref();
            Some(Usage {
                input: tokens.map_or(0, |t| t.input),
                output: tokens.map_or(0, |t| t.output),
                reasoning: tokens.map_or(0, |t| t.reasoning),
                cache_read: tokens.map_or(0, |t| t.cache.read),
                cache_write: tokens.map_or(0, |t| t.cache.write),
                cost: cost.unwrap_or(0.0),
            })
        }
    };

    RunEvent::StepFinish {
        reason: part.reason,
        usage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wire(value: Value) -> WireEvent {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_session_id_from_envelope_or_part() {
        let event = wire(json!({"type": "step_start", "sessionID": "ses_1", "part": {}}));
        assert_eq!(event.session_id(), Some("ses_1"));

        let event = wire(json!({"type": "text", "part": {"sessionID": "ses_2", "text": "x"}}));
        assert_eq!(event.session_id(), Some("ses_2"));

        let event = wire(json!({"type": "text", "sessionID": "", "part": {}}));
        assert_eq!(event.session_id(), None);
    }

    #[test]
    fn test_text_prefers_delta() {
        let event = wire(json!({"type": "text-delta", "part": {"delta": "lo", "text": "hello"}}));
        assert_eq!(event.into_event(), RunEvent::TextDelta("lo".to_string()));

        let event = wire(json!({"type": "text", "part": {"text": "hello"}}));
        assert_eq!(event.into_event(), RunEvent::TextDelta("hello".to_string()));
    }

    #[test]
    fn test_completed_tool_with_nested_state() {
        let event = wire(json!({
            "type": "tool_use",
            "part": {
                "type": "tool",
                "callID": "call_7",
                "tool": "bash",
                "state": {
                    "status": "completed",
                    "title": "List files",
                    "input": {"command": "ls"},
                    "output": "Cargo.toml\nsrc\n"
                }
            }
        }));

        match event.into_event() {
            RunEvent::ToolUse(call) => {
                assert_eq!(call.call_id, "call_7");
                assert_eq!(call.tool, "bash");
                assert_eq!(call.title.as_deref(), Some("List files"));
                assert_eq!(call.status, ToolStatus::Completed);
                assert_eq!(call.input, json!({"command": "ls"}));
                assert_eq!(call.output.as_deref(), Some("Cargo.toml\nsrc\n"));
            }
            other => panic!("expected tool use, got {:?}", other),
        }
    }

    #[test]
    fn test_running_tool_drops_output() {
        let event = wire(json!({
            "type": "tool_use",
            "part": {"tool": "read", "status": "pending", "input": {"filePath": "a.rs"}, "output": "stale"}
        }));

        match event.into_event() {
            RunEvent::ToolUse(call) => {
                assert_eq!(call.status, ToolStatus::Running);
                assert_eq!(call.output, None);
                assert_eq!(call.input["filePath"], "a.rs");
            }
            other => panic!("expected tool use, got {:?}", other),
        }
    }

    #[test]
    fn test_error_and_failed_status_keep_output() {
        for raw in ["error", "failed"] {
            let event = wire(json!({
                "type": "tool_use",
                "part": {"tool": "bash", "state": {"status": raw, "output": "exit 1"}}
            }));

            match event.into_event() {
                RunEvent::ToolUse(call) => {
                    assert_eq!(call.status, ToolStatus::Failed, "status {}", raw);
                    assert_eq!(call.output.as_deref(), Some("exit 1"));
                }
                other => panic!("expected tool use, got {:?}", other),
            }
        }
        assert_eq!(ToolStatus::parse(Some("pending")), ToolStatus::Running);
        assert_eq!(ToolStatus::parse(None), ToolStatus::Running);
    }

    #[test]
    fn test_step_finish_usage() {
        let event = wire(json!({
            "type": "step_finish",
            "part": {
                "reason": "stop",
                "cost": 0.0125,
                "tokens": {"input": 1200, "output": 80, "reasoning": 5, "cache": {"read": 3000, "write": 10}}
            }
        }));

        assert_eq!(
            event.into_event(),
            RunEvent::StepFinish {
                reason: Some("stop".to_string()),
                usage: Some(Usage {
                    input: 1200,
                    output: 80,
                    reasoning: 5,
                    cache_read: 3000,
                    cache_write: 10,
                    cost: 0.0125,
                }),
            }
        );
    }

    #[test]
    fn test_step_finish_without_usage() {
        let event = wire(json!({"type": "step-finish", "part": {"reason": "tool-calls"}}));
        assert_eq!(
            event.into_event(),
            RunEvent::StepFinish {
                reason: Some("tool-calls".to_string()),
                usage: None,
            }
        );
    }

    #[test]
    fn test_unknown_type_is_preserved() {
        let event = wire(json!({"type": "file_edited", "part": {}}));
        assert_eq!(event.into_event(), RunEvent::Other("file_edited".to_string()));
    }
}
