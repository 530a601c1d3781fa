//! Command-line interface
//!
//! - `args` - clap argument structures
//! - `router` - dispatch to subcommand implementations
//! - `commands` - the subcommands themselves

pub mod args;
pub mod commands;
pub mod router;

pub use args::{Cli, Commands, RunArgs};
pub use router::execute_command;
