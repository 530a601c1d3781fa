//! What a single opencode run needs, and how it becomes a command line

use std::path::{Path, PathBuf};

use crate::subprocess::{ProcessCommand, ProcessCommandBuilder};

/// Flags every run carries: JSON event stream plus reasoning output
pub const BASE_RUN_ARGS: [&str; 4] = ["run", "--format", "json", "--thinking"];

/// Inputs for one invocation of `opencode run`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunRequest {
    pub message: String,
    pub session_id: Option<String>,
    pub working_dir: Option<PathBuf>,
    pub model: Option<String>,
    pub agent: Option<String>,
    pub command: Option<String>,
    pub files: Vec<PathBuf>,
}

impl RunRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_session(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }

    pub fn with_working_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.working_dir = dir;
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_agent(mut self, agent: Option<String>) -> Self {
        self.agent = agent;
        self
    }

    pub fn with_command(mut self, command: Option<String>) -> Self {
        self.command = command;
        self
    }

    pub fn with_files(mut self, files: Vec<PathBuf>) -> Self {
        self.files = files;
        self
    }

    /// Build the process invocation; the message is always the last argument,
    /// after `--` so text starting with `-` is never read as a flag
    pub fn to_command(&self, binary: &Path) -> ProcessCommand {
        let dir = self.working_dir.as_ref().map(|d| d.display().to_string());

        let mut builder = ProcessCommandBuilder::new(binary.display().to_string())
            .args(BASE_RUN_ARGS)
            .flag_opt("--session", self.session_id.as_deref())
            .flag_opt("--model", self.model.as_deref())
            .flag_opt("--agent", self.agent.as_deref())
            .flag_opt("--command", self.command.as_deref())
            .flag_opt("--dir", dir.as_deref());

        for file in &self.files {
            builder = builder.arg("--file").arg(file.display().to_string());
        }
        if let Some(dir) = &self.working_dir {
            builder = builder.current_dir(dir);
        }

        builder.arg("--").arg(self.message.as_str()).build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_command() {
        let command = RunRequest::new("hello").to_command(Path::new("/opt/opencode"));

        assert_eq!(command.program, "/opt/opencode");
        assert_eq!(command.args, vec!["run", "--format", "json", "--thinking", "--", "hello"]);
        assert_eq!(command.working_dir, None);
    }

    #[test]
    fn test_full_command_keeps_message_last() {
        let request = RunRequest::new("fix the tests")
            .with_session(Some("ses_42".to_string()))
            .with_working_dir(Some(PathBuf::from("/work/app")))
            .with_model(Some("anthropic/claude-sonnet-4".to_string()))
            .with_agent(Some("build".to_string()))
            .with_command(Some("review".to_string()))
            .with_files(vec![PathBuf::from("/tmp/a.png"), PathBuf::from("/tmp/b.txt")]);

        let command = request.to_command(Path::new("opencode"));

        assert_eq!(
            command.args,
            vec![
                "run",
                "--format",
                "json",
                "--thinking",
                "--session",
                "ses_42",
                "--model",
                "anthropic/claude-sonnet-4",
                "--agent",
                "build",
                "--command",
                "review",
                "--dir",
                "/work/app",
                "--file",
                "/tmp/a.png",
                "--file",
                "/tmp/b.txt",
                "--",
                "fix the tests",
            ]
        );
        assert_eq!(command.working_dir, Some(PathBuf::from("/work/app")));
    }

    #[test]
    fn test_dash_message_stays_positional() {
        let command = RunRequest::new("--help me read this")
            .with_session(Some("ses_1".to_string()))
            .to_command(Path::new("opencode"));

        let n = command.args.len();
        assert_eq!(command.args[n - 2], "--");
        assert_eq!(command.args[n - 1], "--help me read this");
        assert_eq!(command.args.iter().filter(|a| *a == "--").count(), 1);
    }
}
