//! Application module
//!
//! Process-level concerns shared by every subcommand:
//! - Logging setup
//! - Configuration loading and service wiring
//! - Shutdown signals
//! - Fatal error reporting

pub mod config;
pub mod error_handling;
pub mod logging;
pub mod runtime;
pub mod signals;

pub use config::AppConfig;
pub use error_handling::handle_fatal_error;
pub use logging::init_logging;
pub use runtime::{initialize_app, Services};
pub use signals::shutdown_signal;
