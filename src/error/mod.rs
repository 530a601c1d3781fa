use std::path::PathBuf;
use thiserror::Error;

pub mod codes;

pub use codes::{describe_error_code, ErrorCode};

/// The unified error type for opencode-relay
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("[E{code:04}] Configuration error: {message}")]
    Config {
        code: u16,
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] Conversation error: {message}")]
    Session {
        code: u16,
        message: String,
        conversation_id: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] Execution error: {message}")]
    Execution {
        code: u16,
        message: String,
        command: Option<String>,
        exit_code: Option<i32>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] Chat channel error: {message}")]
    Channel {
        code: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] {message}")]
    Other {
        code: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl RelayError {
    /// Create a configuration error with default code
    pub fn config(message: impl Into<String>) -> Self {
        Self::config_with_code(ErrorCode::CONFIG_GENERIC, message, None)
    }

    /// Create a configuration error with specific code and file path
    pub fn config_with_code(code: u16, message: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self::Config {
            code,
            message: message.into(),
            path,
            source: None,
        }
    }

    /// Create a conversation error for a specific conversation
    pub fn session(code: u16, message: impl Into<String>, conversation_id: &str) -> Self {
        Self::Session {
            code,
            message: message.into(),
            conversation_id: Some(conversation_id.to_string()),
            source: None,
        }
    }

    /// Create an execution error with default code
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            code: ErrorCode::EXEC_GENERIC,
            message: message.into(),
            command: None,
            exit_code: None,
            source: None,
        }
    }

    pub fn channel(code: u16, message: impl Into<String>) -> Self {
        Self::Channel {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            code: ErrorCode::OTHER_GENERIC,
            message: message.into(),
            source: None,
        }
    }

    /// Attach an underlying cause
    pub fn with_source(mut self, err: impl std::error::Error + Send + Sync + 'static) -> Self {
        match &mut self {
            Self::Config { source, .. }
            | Self::Session { source, .. }
            | Self::Execution { source, .. }
            | Self::Channel { source, .. }
            | Self::Other { source, .. } => *source = Some(Box::new(err)),
        }
        self
    }

    /// Process exit code for the CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } => 2,
            Self::Session { .. } => 3,
            Self::Execution { .. } => 5,
            Self::Channel { .. } => 6,
            Self::Other { .. } => 1,
        }
    }

    /// Get the error code
    pub fn code(&self) -> u16 {
        match self {
            Self::Config { code, .. }
            | Self::Session { code, .. }
            | Self::Execution { code, .. }
            | Self::Channel { code, .. }
            | Self::Other { code, .. } => *code,
        }
    }

    /// Message suitable for showing to the person running the bridge
    pub fn user_message(&self) -> String {
        match self {
            Self::Config { message, path, .. } => match path {
                Some(p) => format!("Configuration problem in {}: {}", p.display(), message),
                None => format!("Configuration problem: {}", message),
            },
            Self::Session {
                message,
                conversation_id,
                ..
            } => match conversation_id {
                Some(id) => format!("Conversation {} error: {}", id, message),
                None => format!("Conversation error: {}", message),
            },
            Self::Execution {
                message, command, ..
            } => match command {
                Some(cmd) => format!("Command '{}' failed: {}", cmd, message),
                None => format!("Execution failed: {}", message),
            },
            Self::Channel { message, .. } => format!("Chat channel error: {}", message),
            Self::Other { message, .. } => message.clone(),
        }
    }

    /// Full message with the code description and the cause chain
    pub fn developer_message(&self) -> String {
        let mut out = format!("{} ({})", self, describe_error_code(self.code()));
        let mut cause = std::error::Error::source(self);
        while let Some(err) = cause {
            out.push_str(&format!("\n  caused by: {}", err));
            cause = err.source();
        }
        out
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subprocess::ProcessError;

    #[test]
    fn test_display_includes_code() {
        let err = RelayError::config("missing allowed_user");
        assert_eq!(
            err.to_string(),
            "[E1000] Configuration error: missing allowed_user"
        );
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_process_error_conversion() {
        let err: RelayError = ProcessError::CommandNotFound("opencode".to_string()).into();
        assert_eq!(err.code(), ErrorCode::EXEC_COMMAND_NOT_FOUND);
        assert_eq!(err.exit_code(), 5);
        assert!(err.user_message().contains("opencode"));
        assert!(err.developer_message().contains("caused by"));
    }

    #[test]
    fn test_session_user_message() {
        let err = RelayError::session(ErrorCode::SESSION_BUSY, "run in progress", "C1:1700.1");
        assert_eq!(
            err.user_message(),
            "Conversation C1:1700.1 error: run in progress"
        );
    }

    #[test]
    fn test_source_is_exposed_through_error_trait() {
        use std::error::Error as _;

        let plain = RelayError::other("no cause");
        assert!(plain.source().is_none());

        let wrapped = RelayError::channel(ErrorCode::CHANNEL_TRANSPORT, "stdin closed")
            .with_source(std::io::Error::other("broken pipe"));
        assert_eq!(wrapped.source().map(|e| e.to_string()).as_deref(), Some("broken pipe"));
    }
}
