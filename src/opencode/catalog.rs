//! Cached listings of the models and agents the local opencode install knows

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::subprocess::{ProcessCommandBuilder, ProcessRunner};

/// `name (type)` lines printed by `opencode agent list`
static AGENT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\S+)\s+\((\w+)\)\s*$").expect("Valid regex pattern"));

pub const DEFAULT_CATALOG_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentInfo {
    pub name: String,
    /// e.g. `primary` or `subagent`
    pub kind: String,
}

struct Cached<T> {
    fetched_at: Instant,
    items: Vec<T>,
}

impl<T: Clone> Cached<T> {
    fn fresh(&self, ttl: Duration) -> Option<Vec<T>> {
        (self.fetched_at.elapsed() < ttl).then(|| self.items.clone())
    }
}

/// Models and agents, each cached for `ttl`.
///
/// A failed listing yields an empty vector and is not cached. Callers must read
/// an empty result as "catalog unavailable", not as "nothing installed".
pub struct Catalog {
    runner: Arc<dyn ProcessRunner>,
    binary: PathBuf,
    ttl: Duration,
    models: Mutex<Option<Cached<String>>>,
    agents: Mutex<Option<Cached<AgentInfo>>>,
}

impl Catalog {
    pub fn new(runner: Arc<dyn ProcessRunner>, binary: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            runner,
            binary: binary.into(),
            ttl,
            models: Mutex::new(None),
            agents: Mutex::new(None),
        }
    }

    pub async fn models(&self) -> Vec<String> {
        let mut slot = self.models.lock().await;
        if let Some(items) = slot.as_ref().and_then(|c| c.fresh(self.ttl)) {
            return items;
        }

        let Some(stdout) = self.query(&["models"]).await else {
            return Vec::new();
        };
        let items = parse_models(&stdout);
        *slot = Some(Cached {
            fetched_at: Instant::now(),
            items: items.clone(),
        });
        items
    }

    pub async fn agents(&self) -> Vec<AgentInfo> {
        let mut slot = self.agents.lock().await;
        if let Some(items) = slot.as_ref().and_then(|c| c.fresh(self.ttl)) {
            return items;
        }

        let Some(stdout) = self.query(&["agent", "list"]).await else {
            return Vec::new();
        };
        let items = parse_agents(&stdout);
        *slot = Some(Cached {
            fetched_at: Instant::now(),
            items: items.clone(),
        });
        items
    }

    /// Drop both caches so the next call re-queries
    pub async fn invalidate(&self) {
        *self.models.lock().await = None;
        *self.agents.lock().await = None;
    }

    async fn query(&self, args: &[&str]) -> Option<String> {
        let command = ProcessCommandBuilder::new(self.binary.display().to_string())
            .args(args)
            .build();

        match self.runner.run(command).await {
            Ok(output) if output.status.success() => Some(output.stdout),
            Ok(output) => {
                tracing::warn!(
                    "opencode {} exited with {:?}: {}",
                    args.join(" "),
                    output.status,
                    output.stderr.trim()
                );
                None
            }
            Err(e) => {
                tracing::warn!("opencode {} failed: {}", args.join(" "), e);
                None
            }
        }
    }
}

fn parse_models(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_agents(stdout: &str) -> Vec<AgentInfo> {
    stdout
        .lines()
        .filter_map(|line| AGENT_LINE.captures(line))
        .map(|caps| AgentInfo {
            name: caps[1].to_string(),
            kind: caps[2].to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subprocess::MockProcessRunner;

    fn catalog(mock: &MockProcessRunner, ttl: Duration) -> Catalog {
        Catalog::new(Arc::new(mock.clone()), "opencode", ttl)
    }

    #[test]
    fn test_parse_agents_ignores_other_lines() {
        let stdout = "build (primary)\n  plan (primary)\ngeneral (subagent)\n\nsome banner text\n";
        let agents = parse_agents(stdout);

        assert_eq!(
            agents,
            vec![
                AgentInfo { name: "build".into(), kind: "primary".into() },
                AgentInfo { name: "plan".into(), kind: "primary".into() },
                AgentInfo { name: "general".into(), kind: "subagent".into() },
            ]
        );
    }

    #[tokio::test]
    async fn test_models_are_cached_within_ttl() {
        let mock = MockProcessRunner::new();
        mock.expect_command("opencode")
            .with_args(|args| args == ["models"])
            .returns_stdout("anthropic/claude-sonnet-4\nopenai/gpt-5\n\n")
            .finish();

        let catalog = catalog(&mock, DEFAULT_CATALOG_TTL);
        assert_eq!(
            catalog.models().await,
            vec!["anthropic/claude-sonnet-4", "openai/gpt-5"]
        );
        assert_eq!(catalog.models().await.len(), 2);
        assert_eq!(mock.call_count("opencode"), 1);

        catalog.invalidate().await;
        catalog.models().await;
        assert_eq!(mock.call_count("opencode"), 2);
    }

    #[tokio::test]
    async fn test_expired_cache_requeries() {
        let mock = MockProcessRunner::new();
        mock.expect_command("opencode")
            .with_args(|args| args == ["agent", "list"])
            .returns_stdout("build (primary)\n")
            .finish();

        let catalog = catalog(&mock, Duration::ZERO);
        catalog.agents().await;
        catalog.agents().await;
        assert_eq!(mock.call_count("opencode"), 2);
    }

    #[tokio::test]
    async fn test_failures_degrade_to_empty_and_are_not_cached() {
        let mock = MockProcessRunner::new();
        mock.expect_command("opencode")
            .with_args(|args| args == ["models"])
            .returns_exit_code(1)
            .finish();
        mock.expect_command("opencode")
            .with_args(|args| args == ["agent", "list"])
            .returns_not_found()
            .finish();

        let catalog = catalog(&mock, DEFAULT_CATALOG_TTL);
        assert!(catalog.models().await.is_empty());
        assert!(catalog.agents().await.is_empty());
        assert!(catalog.models().await.is_empty());
        assert_eq!(mock.call_count("opencode"), 3);
    }
}
