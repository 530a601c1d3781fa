//! Inline directives and bridge commands in message text
//!
//! ```text
//! dir:~/src/app model:anthropic/claude-sonnet-4 /review focus on errors
//! ```
//!
//! Leading `dir:`, `model:` and `agent:` tokens configure the conversation, a
//! following `/name` token selects a slash command, and the rest is the
//! message. An empty `model:` or `agent:` clears the override.

use std::path::PathBuf;

/// Text with its leading directives split off
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMessage {
    pub dir: Option<PathBuf>,
    /// `Some(None)` clears the override
    pub model: Option<Option<String>>,
    pub agent: Option<Option<String>>,
    pub command: Option<String>,
    pub payload: String,
}

impl ParsedMessage {
    pub fn has_directives(&self) -> bool {
        self.dir.is_some() || self.model.is_some() || self.agent.is_some()
    }
}

/// Administrative commands handled by the bridge itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeCommand {
    /// Forget the conversation's session and settings
    Reset,
    /// List every known conversation
    Status,
}

impl BridgeCommand {
    pub fn parse(text: &str) -> Option<Self> {
        match text.split_whitespace().next()? {
            "!reset" => Some(BridgeCommand::Reset),
            "!status" => Some(BridgeCommand::Status),
            _ => None,
        }
    }
}

/// First whitespace-delimited token and everything after it
fn next_token(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start();
    if text.is_empty() {
        return None;
    }
    let end = text.find(char::is_whitespace).unwrap_or(text.len());
    Some(text.split_at(end))
}

fn optional(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix('~'), dirs::home_dir()) {
        (Some(""), Some(home)) => home,
        (Some(rest), Some(home)) if rest.starts_with('/') => home.join(&rest[1..]),
        _ => PathBuf::from(path),
    }
}

pub fn parse_message(text: &str) -> ParsedMessage {
    let mut parsed = ParsedMessage::default();
    let mut rest = text;

    while let Some((token, after)) = next_token(rest) {
        if let Some(path) = token.strip_prefix("dir:").filter(|p| !p.is_empty()) {
            parsed.dir = Some(expand_home(path));
        } else if let Some(model) = token.strip_prefix("model:") {
            parsed.model = Some(optional(model));
        } else if let Some(agent) = token.strip_prefix("agent:") {
            parsed.agent = Some(optional(agent));
        } else {
            break;
        }
        rest = after;
    }

    if let Some((token, after)) = next_token(rest) {
        let command = token
            .strip_prefix('/')
            .filter(|name| !name.is_empty() && !name.contains('/'));
        if let Some(command) = command {
            parsed.command = Some(command.to_string());
            rest = after;
        }
    }

    parsed.payload = rest.trim().to_string();
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_message() {
        let parsed = parse_message("  fix the failing test\nplease ");
        assert_eq!(parsed.payload, "fix the failing test\nplease");
        assert!(!parsed.has_directives());
        assert_eq!(parsed.command, None);
    }

    #[test]
    fn test_dir_directive() {
        let parsed = parse_message("dir:/srv/app what does main do?");
        assert_eq!(parsed.dir, Some(PathBuf::from("/srv/app")));
        assert_eq!(parsed.payload, "what does main do?");
    }

    #[test]
    fn test_home_expansion() {
        let parsed = parse_message("dir:~/src/app hi");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(parsed.dir, Some(home.join("src/app")));
        }
        let parsed = parse_message("dir:~other/app hi");
        assert_eq!(parsed.dir, Some(PathBuf::from("~other/app")));
    }

    #[test]
    fn test_stacked_directives_and_command() {
        let parsed = parse_message("model:openai/gpt-5 agent:plan /review  focus on errors");
        assert_eq!(parsed.model, Some(Some("openai/gpt-5".to_string())));
        assert_eq!(parsed.agent, Some(Some("plan".to_string())));
        assert_eq!(parsed.command.as_deref(), Some("review"));
        assert_eq!(parsed.payload, "focus on errors");
    }

    #[test]
    fn test_empty_override_clears() {
        let parsed = parse_message("model: agent: hello");
        assert_eq!(parsed.model, Some(None));
        assert_eq!(parsed.agent, Some(None));
        assert_eq!(parsed.payload, "hello");
    }

    #[test]
    fn test_directives_only_count_when_leading() {
        let parsed = parse_message("please use dir:/tmp for this");
        assert_eq!(parsed.dir, None);
        assert_eq!(parsed.payload, "please use dir:/tmp for this");
    }

    #[test]
    fn test_absolute_path_is_not_a_command() {
        let parsed = parse_message("/etc/hosts looks wrong");
        assert_eq!(parsed.command, None);
        assert_eq!(parsed.payload, "/etc/hosts looks wrong");
    }

    #[test]
    fn test_bridge_commands() {
        assert_eq!(BridgeCommand::parse(" !reset "), Some(BridgeCommand::Reset));
        assert_eq!(BridgeCommand::parse("!status now"), Some(BridgeCommand::Status));
        assert_eq!(BridgeCommand::parse("reset"), None);
        assert_eq!(BridgeCommand::parse(""), None);
    }
}
