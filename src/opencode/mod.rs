//! Integration with the opencode CLI
//!
//! - `request` - run inputs and their command-line form
//! - `events` - the JSON event stream emitted by `opencode run --format json`
//! - `runner` - spawning runs and streaming their events
//! - `catalog` - cached `models` / `agent list` queries

pub mod catalog;
pub mod events;
pub mod request;
pub mod runner;

pub use catalog::{AgentInfo, Catalog, DEFAULT_CATALOG_TTL};
pub use events::{RunEvent, ToolCall, ToolStatus, Usage, WireEvent};
pub use request::RunRequest;
pub use runner::{AbortHandle, OpencodeRunner, RunCompletion, RunHandle, RunLauncher, RunSignal};

use std::path::PathBuf;

/// Where the opencode installer puts the binary
pub fn default_binary() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".opencode").join("bin").join("opencode"))
        .unwrap_or_else(|| PathBuf::from("opencode"))
}
