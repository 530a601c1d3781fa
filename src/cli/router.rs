//! Command routing and execution

use anyhow::Result;

use crate::app::{initialize_app, AppConfig, Services};
use crate::bridge::serve::StopReason;
use crate::cli::args::Commands;
use crate::cli::commands::{list_agents, list_models, run_once, run_serve};

/// How the process should end after a command succeeded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Normal,
    /// Exit without waiting on the stdin reader thread, which cannot be cancelled
    Immediate,
}

/// Load configuration, then execute `command`
pub async fn execute_command(command: Commands, app: &AppConfig) -> Result<Exit> {
    let config = initialize_app(app).await?;
    let services = Services::new(config);

    match command {
        Commands::Serve => match run_serve(&services).await? {
            StopReason::EndOfInput => Ok(Exit::Normal),
            StopReason::Shutdown => Ok(Exit::Immediate),
        },
        Commands::Run(args) => run_once(&services, args).await.map(|_| Exit::Normal),
        Commands::Models => list_models(&services).await.map(|_| Exit::Normal),
        Commands::Agents => list_agents(&services).await.map(|_| Exit::Normal),
    }
}
