//! Formatting of tool calls and usage summaries

use serde_json::Value;

use super::blocks::Block;
use super::split::clip;
use crate::opencode::{ToolCall, ToolStatus, Usage};

/// Characters taken by the code fence around a body
const FENCE_OVERHEAD: usize = 8;

fn status_icon(status: ToolStatus) -> &'static str {
    match status {
        ToolStatus::Running => "⏳",
        ToolStatus::Completed => "✅",
        ToolStatus::Failed => "❌",
    }
}

fn str_field<'a>(input: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| input.get(*key).and_then(Value::as_str))
}

fn path_of(input: &Value) -> Option<&str> {
    str_field(input, &["filePath", "file_path", "path"])
}

fn fenced(body: &str, max_chars: usize) -> String {
    format!("```\n{}\n```", clip(body, max_chars.saturating_sub(FENCE_OVERHEAD)))
}

fn prefixed_lines(text: &str, prefix: char) -> String {
    text.lines()
        .map(|line| format!("{}{}", prefix, line))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn tool_header(call: &ToolCall) -> String {
    let title = call
        .title
        .as_deref()
        .or_else(|| (!call.call_id.is_empty()).then_some(call.call_id.as_str()));

    match title {
        Some(title) => format!("{} *{}* · {}", status_icon(call.status), call.tool, title),
        None => format!("{} *{}*", status_icon(call.status), call.tool),
    }
}

/// Body describing what the tool was asked to do, if there is anything to show
pub fn tool_input(call: &ToolCall, max_chars: usize) -> Option<String> {
    let input = &call.input;
    if input.is_null() || input.as_object().is_some_and(|o| o.is_empty()) {
        return None;
    }

    let formatted = match call.tool.as_str() {
        "bash" => str_field(input, &["command"]).map(|command| fenced(command, max_chars)),
        "read" => path_of(input).map(|path| format!("`{}`", path)),
        "write" => path_of(input).map(|path| {
            let content = str_field(input, &["content"]).unwrap_or_default();
            let budget = max_chars.saturating_sub(path.chars().count() + 3);
            format!("`{}`\n{}", path, fenced(content, budget))
        }),
        "edit" => path_of(input).map(|path| {
            let old = str_field(input, &["oldString", "old_string"]).unwrap_or_default();
            let new = str_field(input, &["newString", "new_string"]).unwrap_or_default();
            let diff = format!("{}\n{}", prefixed_lines(old, '-'), prefixed_lines(new, '+'));
            let budget = max_chars.saturating_sub(path.chars().count() + 3);
            format!("`{}`\n{}", path, fenced(&diff, budget))
        }),
        _ => None,
    };

    // Unknown tools, or known tools missing the fields above, show the raw input
    formatted.or_else(|| {
        let raw = serde_json::to_string_pretty(input).unwrap_or_else(|_| input.to_string());
        Some(fenced(&raw, max_chars))
    })
}

pub fn tool_blocks(call: &ToolCall, max_chars: usize) -> Vec<Block> {
    let mut blocks = vec![Block::section(clip(&tool_header(call), max_chars))];

    if let Some(input) = tool_input(call, max_chars) {
        blocks.push(Block::section(input));
    }

    if call.status == ToolStatus::Completed {
        if let Some(output) = call.output.as_deref().filter(|o| !o.trim().is_empty()) {
            blocks.push(Block::section(fenced(output, max_chars)));
        }
    }

    blocks.push(Block::Divider);
    blocks
}

/// `1234` → `1.2k`, `2500000` → `2.5M`
pub fn abbreviate(count: u64) -> String {
    /// One decimal, rounded half up, without a trailing `.0`
    fn scaled(count: u64, unit: u64, suffix: &str) -> String {
        let tenths = count.saturating_add(unit / 20) / (unit / 10);
        match tenths % 10 {
            0 => format!("{}{}", tenths / 10, suffix),
            frac => format!("{}.{}{}", tenths / 10, frac, suffix),
        }
    }

    // Anything that would round up to 1000.0k is shown in millions
    match count {
        0..=999 => count.to_string(),
        1_000..=999_949 => scaled(count, 1_000, "k"),
        _ => scaled(count, 1_000_000, "M"),
    }
}

pub fn usage_line(usage: &Usage) -> String {
    let mut line = format!(
        "📊 {} in · {} out",
        abbreviate(usage.input),
        abbreviate(usage.output)
    );
    if usage.cache_read > 0 {
        line.push_str(&format!(" · {} cached", abbreviate(usage.cache_read)));
    }
    if usage.cost > 0.0 {
        line.push_str(&format!(" · ${:.4}", usage.cost));
    }
    line
}
