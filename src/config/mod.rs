//! Bot configuration loading and per-repository scoping.
//!
//! Each bot reads one YAML file. The parsed value lives behind an
//! `RwLock<Arc<C>>` so handlers take a cheap snapshot per event while a
//! background task swaps in a fresh copy on reload.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// A bot configuration file.
pub trait BotConfig: DeserializeOwned + Send + Sync + 'static {
    /// Fills defaults and rejects inconsistent settings after parsing.
    fn validate(&mut self) -> Result<(), ConfigError> {
        Ok(())
    }
}

/// Parses and validates a configuration document.
pub fn parse_config<C: BotConfig>(yaml: &str) -> Result<C, ConfigError> {
    let mut config: C = serde_yaml::from_str(yaml)?;
    config.validate()?;
    Ok(config)
}

/// Holds the current configuration and reloads it from disk.
pub struct ConfigAgent<C> {
    current: Arc<RwLock<Arc<C>>>,
    path: Option<PathBuf>,
}

impl<C> Clone for ConfigAgent<C> {
    fn clone(&self) -> Self {
        ConfigAgent {
            current: Arc::clone(&self.current),
            path: self.path.clone(),
        }
    }
}

impl<C: BotConfig> ConfigAgent<C> {
    /// Loads the configuration at `path`. Fails if the initial load fails.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let config = read_config::<C>(&path)?;
        Ok(ConfigAgent {
            current: Arc::new(RwLock::new(Arc::new(config))),
            path: Some(path),
        })
    }

    /// An agent that always serves `config`; `reload` is a no-op.
    pub fn fixed(config: C) -> Self {
        ConfigAgent {
            current: Arc::new(RwLock::new(Arc::new(config))),
            path: None,
        }
    }

    /// Returns a snapshot of the current configuration.
    pub fn current(&self) -> Arc<C> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Re-reads the file. On failure the previous configuration stays active.
    pub fn reload(&self) -> Result<(), ConfigError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let fresh = Arc::new(read_config::<C>(path)?);
        match self.current.write() {
            Ok(mut guard) => *guard = fresh,
            Err(poisoned) => *poisoned.into_inner() = fresh,
        }
        Ok(())
    }

    /// Reloads every `period` until `cancel` fires.
    pub fn spawn_reload(&self, period: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let agent = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately and the file was just loaded.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => match agent.reload() {
                        Ok(()) => debug!(path = ?agent.path, "config reloaded"),
                        Err(e) => warn!(path = ?agent.path, error = %e, "config reload failed, keeping previous config"),
                    },
                }
            }
        })
    }
}

fn read_config<C: BotConfig>(path: &Path) -> Result<C, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&text)
}

/// Scopes a configuration item to organisations and repositories.
///
/// `repos` holds `org` or `org/repo` entries; `excluded_repos` holds
/// `org/repo` entries carved out of an org-wide entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RepoFilter {
    #[serde(default)]
    pub repos: Vec<String>,
    #[serde(default)]
    pub excluded_repos: Vec<String>,
}

impl RepoFilter {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.repos.is_empty() {
            return Err(ConfigError::Invalid("repos must be set".to_string()));
        }
        for r in &self.excluded_repos {
            if !r.contains('/') {
                return Err(ConfigError::Invalid(format!(
                    "excluded repo {r} must be in org/repo form"
                )));
            }
            if !self.repos.iter().any(|org| r.split('/').next() == Some(org.as_str())) {
                return Err(ConfigError::Invalid(format!(
                    "excluded repo {r} is not covered by any org entry"
                )));
            }
        }
        Ok(())
    }

    /// Whether this item applies to `org/repo`.
    pub fn can_apply(&self, org: &str, repo: &str) -> bool {
        let full = format!("{org}/{repo}");
        if self.repos.iter().any(|r| *r == full) {
            return true;
        }
        self.repos.iter().any(|r| r == org) && !self.excluded_repos.iter().any(|r| *r == full)
    }

    fn matches_exactly(&self, org: &str, repo: &str) -> bool {
        let full = format!("{org}/{repo}");
        self.repos.iter().any(|r| *r == full)
    }
}

/// A per-repository config item.
pub trait RepoScoped {
    fn repo_filter(&self) -> &RepoFilter;
}

/// Picks the item for `org/repo`, preferring an exact repository entry over an
/// org-wide one.
pub fn find_config<'a, T: RepoScoped>(items: &'a [T], org: &str, repo: &str) -> Option<&'a T> {
    items
        .iter()
        .find(|i| i.repo_filter().matches_exactly(org, repo))
        .or_else(|| items.iter().find(|i| i.repo_filter().can_apply(org, repo)))
}
