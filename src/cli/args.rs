//! CLI argument structures

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Relay threaded chat conversations to opencode
#[derive(Parser, Debug)]
#[command(name = "opencode-relay")]
#[command(about = "opencode-relay - Drive opencode sessions from chat threads", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (defaults to config.toml in the platform config directory)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read inbound messages as JSON lines on stdin, write chat operations to stdout
    Serve,

    /// Run a single message through opencode and print the result
    Run(RunArgs),

    /// List the models opencode can use
    Models,

    /// List the agents opencode knows
    Agents,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// The prompt to send
    pub message: String,

    /// Working directory for the run
    #[arg(short, long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Model as provider/model
    #[arg(short, long)]
    pub model: Option<String>,

    /// Agent to run with
    #[arg(short, long)]
    pub agent: Option<String>,

    /// Continue an existing opencode session
    #[arg(short, long, value_name = "SESSION_ID")]
    pub session: Option<String>,

    /// Run a slash command, with the message as its arguments
    #[arg(long, value_name = "NAME")]
    pub command: Option<String>,

    /// Attach a file (repeatable)
    #[arg(short, long = "file", value_name = "PATH")]
    pub files: Vec<PathBuf>,
}
