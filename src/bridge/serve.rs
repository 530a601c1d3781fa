//! The JSON-lines serve loop

use std::future::Future;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use super::Bridge;
use crate::chat::InboundMessage;
use crate::error::{ErrorCode, RelayError, Result};

/// Why the serve loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Input closed; in-flight work was allowed to finish
    EndOfInput,
    /// Shutdown requested; active runs were aborted
    Shutdown,
}

/// Feed one [`InboundMessage`] per input line to `bridge` until the input ends
/// or `shutdown` resolves.
///
/// Malformed lines are logged and skipped. Either way the loop returns only
/// once no conversation has a worker left.
pub async fn serve<R, S>(bridge: &Bridge, input: R, shutdown: S) -> Result<StopReason>
where
    R: AsyncBufRead + Unpin,
    S: Future<Output = ()>,
{
    let mut lines = input.lines();
    tokio::pin!(shutdown);

    let reason = loop {
        tokio::select! {
            _ = &mut shutdown => break StopReason::Shutdown,
            line = lines.next_line() => {
                let line = line.map_err(|e| {
                    RelayError::channel(
                        ErrorCode::CHANNEL_TRANSPORT,
                        "Failed to read inbound messages",
                    )
                    .with_source(e)
                })?;
                let Some(line) = line else {
                    break StopReason::EndOfInput;
                };
                dispatch(bridge, &line).await;
            }
        }
    };

    let orchestrator = bridge.orchestrator();
    match reason {
        StopReason::Shutdown => {
            let aborted = orchestrator.shutdown();
            tracing::info!(aborted, "Shutting down");
        }
        StopReason::EndOfInput => {
            tracing::info!("Input closed, waiting for active conversations to finish");
        }
    }
    orchestrator.wait_idle().await;
    Ok(reason)
}

async fn dispatch(bridge: &Bridge, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }

    let message: InboundMessage = match serde_json::from_str(line) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!("Skipping malformed inbound line: {}", e);
            return;
        }
    };

    match bridge.handle(message).await {
        Ok(handled) => tracing::trace!(?handled, "Inbound message handled"),
        Err(e) => tracing::error!("Failed to handle inbound message: {}", e.developer_message()),
    }
}
