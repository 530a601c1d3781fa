use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::RelayConfig;
use crate::error::{ErrorCode, RelayError, Result};

/// `config.toml` inside the platform config directory, if one can be determined
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("dev", "opencode-relay", "opencode-relay")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Builds a [`RelayConfig`] from file and environment
pub struct ConfigLoader {
    explicit: Option<PathBuf>,
    fallback: Option<PathBuf>,
    use_env: bool,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            explicit: None,
            fallback: default_config_path(),
            use_env: true,
        }
    }

    /// A file given on the command line. Unlike the default location it must exist.
    pub fn with_path(mut self, path: Option<PathBuf>) -> Self {
        self.explicit = path;
        self
    }

    pub fn with_fallback(mut self, path: Option<PathBuf>) -> Self {
        self.fallback = path;
        self
    }

    pub fn with_env(mut self, enabled: bool) -> Self {
        self.use_env = enabled;
        self
    }

    pub async fn load(&self) -> Result<RelayConfig> {
        let mut config = match (&self.explicit, &self.fallback) {
            (Some(path), _) => load_file(path).await?,
            (None, Some(path)) if path.exists() => load_file(path).await?,
            _ => {
                tracing::debug!("No configuration file found, using defaults");
                RelayConfig::default()
            }
        };

        if self.use_env {
            config.merge_env_vars()?;
        }
        config.expand_paths();
        config.validate()?;
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

async fn load_file(path: &Path) -> Result<RelayConfig> {
    let content = fs::read_to_string(path).await.map_err(|e| {
        let code = if e.kind() == std::io::ErrorKind::NotFound {
            ErrorCode::CONFIG_NOT_FOUND
        } else {
            ErrorCode::CONFIG_GENERIC
        };
        RelayError::config_with_code(
            code,
            format!("Cannot read file: {}", e),
            Some(path.to_path_buf()),
        )
        .with_source(e)
    })?;

    tracing::debug!("Loaded configuration from {}", path.display());

    RelayConfig::from_toml(&content).map_err(|e| match e {
        RelayError::Config {
            code,
            message,
            source,
            ..
        } => RelayError::Config {
            code,
            message,
            path: Some(path.to_path_buf()),
            source,
        },
        other => other,
    })
}
