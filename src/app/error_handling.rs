//! Fatal error reporting

use tracing::error;

use crate::error::RelayError;

/// Exit code and the lines to print for a fatal error.
///
/// `RelayError`s show their user message, plus the developer message with the
/// cause chain when `verbose >= 1`. Anything else prints its own chain.
pub fn describe_fatal_error(error: &anyhow::Error, verbose: u8) -> (i32, Vec<String>) {
    let mut lines = Vec::new();

    let exit_code = if let Some(relay_err) = error.downcast_ref::<RelayError>() {
        lines.push(relay_err.user_message());
        if verbose >= 1 {
            lines.push(format!("\nContext Chain:\n{}", relay_err.developer_message()));
        }
        relay_err.exit_code()
    } else {
        lines.push(format!("Error: {error}"));
        if verbose >= 1 {
            lines.push("\nError chain:".to_string());
            for (i, cause) in error.chain().enumerate() {
                lines.push(format!("  {}: {}", i, cause));
            }
        }
        1
    };

    (exit_code, lines)
}

/// Print `error` to stderr and exit with its mapped status code
pub fn handle_fatal_error(error: anyhow::Error, verbose: u8) -> ! {
    error!("Fatal error: {}", error);

    let (exit_code, lines) = describe_fatal_error(&error, verbose);
    for line in lines {
        eprintln!("{}", line);
    }

    std::process::exit(exit_code)
}
