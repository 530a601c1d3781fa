use crate::error::{ErrorCode, RelayError};

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Permission denied executing {0}")]
    PermissionDenied(String),

    #[error("Failed to spawn '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Process exited with code {0}")]
    ExitCode(i32),

    #[error("Process terminated by signal {0}")]
    Signal(i32),

    #[error("Output stream error: {0}")]
    Stream(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Mock expectation not met: {0}")]
    MockExpectationNotMet(String),
}

impl ProcessError {
    /// True when the failure happened before the process ever ran
    pub fn is_spawn_failure(&self) -> bool {
        matches!(
            self,
            Self::CommandNotFound(_) | Self::PermissionDenied(_) | Self::SpawnFailed { .. }
        )
    }
}

/// Convert ProcessError to RelayError
impl From<ProcessError> for RelayError {
    fn from(err: ProcessError) -> Self {
        let (code, command, exit_code) = match &err {
            ProcessError::CommandNotFound(cmd) => {
                (ErrorCode::EXEC_COMMAND_NOT_FOUND, Some(cmd.clone()), None)
            }
            ProcessError::PermissionDenied(cmd) => {
                (ErrorCode::EXEC_PERMISSION_DENIED, Some(cmd.clone()), None)
            }
            ProcessError::SpawnFailed { command, .. } => {
                (ErrorCode::EXEC_SPAWN_FAILED, Some(command.clone()), None)
            }
            ProcessError::ExitCode(code) => (ErrorCode::EXEC_SUBPROCESS_FAILED, None, Some(*code)),
            ProcessError::Signal(sig) => (ErrorCode::EXEC_SIGNAL_RECEIVED, None, Some(*sig)),
            ProcessError::Stream(_) | ProcessError::Io(_) | ProcessError::Utf8(_) => {
                (ErrorCode::EXEC_OUTPUT_ERROR, None, None)
            }
            ProcessError::MockExpectationNotMet(_) => (ErrorCode::EXEC_GENERIC, None, None),
        };

        RelayError::Execution {
            code,
            message: err.to_string(),
            command,
            exit_code,
            source: Some(Box::new(err)),
        }
    }
}
