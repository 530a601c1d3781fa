use anyhow::Result;
use std::sync::Arc;

use crate::app::{shutdown_signal, Services};
use crate::bridge::{serve, serve::StopReason};
use crate::chat::ConsoleChannel;

/// The `serve` subcommand: stdin in, stdout out, until EOF or a signal
pub async fn run_serve(services: &Services) -> Result<StopReason> {
    let channel = Arc::new(ConsoleChannel::stdout());
    let bridge = services.bridge(channel);

    tracing::info!(
        opencode = %services.config.opencode_bin.display(),
        "Serving inbound messages from stdin"
    );

    let input = tokio::io::BufReader::new(tokio::io::stdin());
    let reason = serve(&bridge, input, shutdown_signal()).await?;

    tracing::info!(?reason, "Serve loop stopped");
    Ok(reason)
}
