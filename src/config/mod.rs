//! Relay configuration
//!
//! Settings are layered with increasing priority:
//!
//! 1. Built-in defaults
//! 2. `config.toml` (from `--config` or the platform config directory)
//! 3. `RELAY_*` environment variables
//!
//! # Example
//!
//! ```toml
//! opencode_bin = "/usr/local/bin/opencode"
//! allowed_user = "U024BE7LH"
//! default_dir = "~/src/app"
//! publish_interval = "1s 500ms"
//! catalog_ttl = "5m"
//! ```

pub mod loader;

pub use loader::{default_config_path, ConfigLoader};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ErrorCode, RelayError, Result};
use crate::opencode::DEFAULT_CATALOG_TTL;
use crate::orchestrator::{OrchestratorSettings, DEFAULT_PUBLISH_INTERVAL};
use crate::render::blocks::{DEFAULT_MAX_BLOCKS, DEFAULT_MAX_BLOCK_CHARS};
use crate::render::RenderLimits;

pub const ENV_OPENCODE_BIN: &str = "RELAY_OPENCODE_BIN";
pub const ENV_ALLOWED_USER: &str = "RELAY_ALLOWED_USER";
pub const ENV_DEFAULT_DIR: &str = "RELAY_DEFAULT_DIR";
pub const ENV_PUBLISH_INTERVAL_MS: &str = "RELAY_PUBLISH_INTERVAL_MS";

/// Blocks shorter than this cannot hold a fenced tool body
const MIN_BLOCK_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelayConfig {
    /// Path to the opencode executable
    pub opencode_bin: PathBuf,

    /// Only messages from this sender are acted on. Everyone is accepted when unset.
    pub allowed_user: Option<String>,

    /// Working directory for conversations that never sent a `dir:` directive
    pub default_dir: Option<PathBuf>,

    #[serde(with = "humantime_serde")]
    pub publish_interval: Duration,

    #[serde(with = "humantime_serde")]
    pub catalog_ttl: Duration,

    pub max_block_chars: usize,

    pub max_blocks: usize,

    /// Post a short notice when a message is queued behind a running one
    pub queue_notice: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            opencode_bin: crate::opencode::default_binary(),
            allowed_user: None,
            default_dir: None,
            publish_interval: DEFAULT_PUBLISH_INTERVAL,
            catalog_ttl: DEFAULT_CATALOG_TTL,
            max_block_chars: DEFAULT_MAX_BLOCK_CHARS,
            max_blocks: DEFAULT_MAX_BLOCKS,
            queue_notice: true,
        }
    }
}

impl RelayConfig {
    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            RelayError::config_with_code(
                ErrorCode::CONFIG_PARSE_ERROR,
                e.message().to_string(),
                None,
            )
            .with_source(e)
        })
    }

    /// Apply `RELAY_*` overrides from the process environment
    pub fn merge_env_vars(&mut self) -> Result<()> {
        self.merge_env_with(|key| std::env::var(key).ok())
    }

    /// Apply `RELAY_*` overrides read through `lookup`
    pub fn merge_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bin) = lookup(ENV_OPENCODE_BIN).filter(|v| !v.is_empty()) {
            self.opencode_bin = PathBuf::from(bin);
        }

        if let Some(user) = lookup(ENV_ALLOWED_USER) {
            self.allowed_user = Some(user).filter(|u| !u.is_empty());
        }

        if let Some(dir) = lookup(ENV_DEFAULT_DIR) {
            self.default_dir = Some(PathBuf::from(dir)).filter(|d| !d.as_os_str().is_empty());
        }

        if let Some(ms) = lookup(ENV_PUBLISH_INTERVAL_MS) {
            let ms: u64 = ms.trim().parse().map_err(|_| {
                RelayError::config_with_code(
                    ErrorCode::CONFIG_INVALID_VALUE,
                    format!(
                        "{} must be a number of milliseconds, got '{}'",
                        ENV_PUBLISH_INTERVAL_MS, ms
                    ),
                    None,
                )
            })?;
            self.publish_interval = Duration::from_millis(ms);
        }

        Ok(())
    }

    /// Expand `~` in path settings
    pub fn expand_paths(&mut self) {
        self.opencode_bin = expand_home(&self.opencode_bin);
        self.default_dir = self.default_dir.as_deref().map(expand_home);
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| {
            Err(RelayError::config_with_code(
                ErrorCode::CONFIG_INVALID_VALUE,
                message,
                None,
            ))
        };

        if self.publish_interval.is_zero() {
            return invalid("publish_interval must be greater than zero".to_string());
        }
        if self.max_block_chars < MIN_BLOCK_CHARS {
            return invalid(format!(
                "max_block_chars must be at least {}, got {}",
                MIN_BLOCK_CHARS, self.max_block_chars
            ));
        }
        if self.max_blocks < 2 {
            return invalid(format!("max_blocks must be at least 2, got {}", self.max_blocks));
        }
        if let Some(dir) = &self.default_dir {
            if !dir.is_dir() {
                return invalid(format!("default_dir {} is not a directory", dir.display()));
            }
        }
        Ok(())
    }

    pub fn render_limits(&self) -> RenderLimits {
        RenderLimits {
            max_block_chars: self.max_block_chars,
            max_blocks: self.max_blocks,
        }
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            publish_interval: self.publish_interval,
            limits: self.render_limits(),
            default_dir: self.default_dir.clone(),
        }
    }
}

fn expand_home(path: &std::path::Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}
