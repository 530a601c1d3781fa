//! Startup and service wiring

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::app::{config::AppConfig, logging::init_logging};
use crate::bridge::Bridge;
use crate::chat::ChatChannel;
use crate::config::{ConfigLoader, RelayConfig};
use crate::opencode::{Catalog, OpencodeRunner};
use crate::orchestrator::Orchestrator;
use crate::session::ConversationStore;
use crate::subprocess::TokioProcessRunner;

/// Set up logging, then load the relay configuration
pub async fn initialize_app(app: &AppConfig) -> Result<RelayConfig> {
    init_logging(app);

    let config = ConfigLoader::new()
        .with_path(app.config_path.clone())
        .load()
        .await
        .context("Failed to load configuration")?;

    tracing::debug!(
        opencode = %config.opencode_bin.display(),
        allowed_user = ?config.allowed_user,
        "Configuration loaded"
    );
    Ok(config)
}

/// The long-lived pieces every subcommand draws from
pub struct Services {
    pub config: RelayConfig,
    pub runner: Arc<OpencodeRunner>,
    pub catalog: Arc<Catalog>,
}

impl Services {
    pub fn new(config: RelayConfig) -> Self {
        let runner = Arc::new(OpencodeRunner::new(config.opencode_bin.clone()));
        let catalog = Arc::new(Catalog::new(
            Arc::new(TokioProcessRunner),
            config.opencode_bin.clone(),
            config.catalog_ttl,
        ));
        Self {
            config,
            runner,
            catalog,
        }
    }

    /// A bridge posting to `channel`, with a fresh conversation store
    pub fn bridge(&self, channel: Arc<dyn ChatChannel>) -> Bridge {
        let orchestrator = Orchestrator::new(
            Arc::new(ConversationStore::new()),
            self.runner.clone(),
            channel,
            self.config.orchestrator_settings(),
        );

        Bridge::new(orchestrator)
            .with_catalog(self.catalog.clone())
            .with_allowed_user(self.config.allowed_user.clone())
            .with_queue_notice(self.config.queue_notice)
    }
}
