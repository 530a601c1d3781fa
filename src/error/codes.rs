/// Error code registry for opencode-relay
///
/// Error codes are organized by category:
/// - 1000-1999: Configuration errors
/// - 2000-2999: Conversation/session errors
/// - 4000-4999: Execution errors
/// - 5000-5999: Chat channel errors
/// - 9000-9999: Other errors
pub struct ErrorCode;

impl ErrorCode {
    // Configuration errors (1000-1999)
    pub const CONFIG_GENERIC: u16 = 1000;
    pub const CONFIG_NOT_FOUND: u16 = 1001;
    pub const CONFIG_PARSE_ERROR: u16 = 1002;
    pub const CONFIG_INVALID_VALUE: u16 = 1003;

    // Conversation errors (2000-2999)
    pub const SESSION_GENERIC: u16 = 2000;
    pub const SESSION_BUSY: u16 = 2001;

    // Execution errors (4000-4999)
    pub const EXEC_GENERIC: u16 = 4000;
    pub const EXEC_COMMAND_NOT_FOUND: u16 = 4001;
    pub const EXEC_SUBPROCESS_FAILED: u16 = 4003;
    pub const EXEC_PERMISSION_DENIED: u16 = 4004;
    pub const EXEC_SIGNAL_RECEIVED: u16 = 4005;
    pub const EXEC_SPAWN_FAILED: u16 = 4006;
    pub const EXEC_OUTPUT_ERROR: u16 = 4007;

    // Chat channel errors (5000-5999)
    pub const CHANNEL_GENERIC: u16 = 5000;
    pub const CHANNEL_RATE_LIMITED: u16 = 5001;
    pub const CHANNEL_NOT_FOUND: u16 = 5002;
    pub const CHANNEL_TRANSPORT: u16 = 5003;

    // Other errors (9000-9999)
    pub const OTHER_GENERIC: u16 = 9000;
}

/// Get a human-readable description for an error code
pub fn describe_error_code(code: u16) -> &'static str {
    match code {
        ErrorCode::CONFIG_GENERIC => "General configuration error",
        ErrorCode::CONFIG_NOT_FOUND => "Configuration file not found",
        ErrorCode::CONFIG_PARSE_ERROR => "Configuration file could not be parsed",
        ErrorCode::CONFIG_INVALID_VALUE => "Invalid configuration value",

        ErrorCode::SESSION_GENERIC => "General conversation error",
        ErrorCode::SESSION_BUSY => "Conversation has a run in progress",

        ErrorCode::EXEC_GENERIC => "General execution error",
        ErrorCode::EXEC_COMMAND_NOT_FOUND => "opencode executable not found",
        ErrorCode::EXEC_SUBPROCESS_FAILED => "Subprocess exited with an error",
        ErrorCode::EXEC_PERMISSION_DENIED => "Permission denied executing subprocess",
        ErrorCode::EXEC_SIGNAL_RECEIVED => "Subprocess terminated by signal",
        ErrorCode::EXEC_SPAWN_FAILED => "Failed to spawn subprocess",
        ErrorCode::EXEC_OUTPUT_ERROR => "Failed to read subprocess output",

        ErrorCode::CHANNEL_GENERIC => "General chat channel error",
        ErrorCode::CHANNEL_RATE_LIMITED => "Chat platform rate limit hit",
        ErrorCode::CHANNEL_NOT_FOUND => "Chat message not found",
        ErrorCode::CHANNEL_TRANSPORT => "Chat transport failure",

        _ => "Unknown error",
    }
}
