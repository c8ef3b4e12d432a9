//! Access relay configuration: downstream bots and which repositories feed
//! them.
//!
//! ```yaml
//! access:
//!   plugins:
//!     - name: review
//!       endpoint: http://robot-review:8888/atomgit-hook
//!       events: [pull_request, review_comment]
//!   repo_plugins:
//!     openeuler: [review]
//!     openeuler/kernel: [label]
//! ```

use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use crate::config::{BotConfig, ConfigError};

#[derive(Debug, Default, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub access: AccessConfig,
}

impl BotConfig for Configuration {
    fn validate(&mut self) -> Result<(), ConfigError> {
        self.access.validate()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AccessConfig {
    #[serde(default)]
    pub plugins: Vec<PluginConfig>,

    /// Plugin names keyed by `org` or `org/repo`.
    #[serde(default)]
    pub repo_plugins: HashMap<String, Vec<String>>,
}

/// A downstream bot.
#[derive(Debug, Clone, Deserialize)]
pub struct PluginConfig {
    pub name: String,
    pub endpoint: String,
    /// Event types the bot wants. Empty means every event.
    #[serde(default)]
    pub events: Vec<String>,
}

impl PluginConfig {
    fn wants(&self, event_type: &str) -> bool {
        self.events.is_empty() || self.events.iter().any(|e| e == event_type)
    }
}

impl AccessConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for plugin in &self.plugins {
            if plugin.name.is_empty() {
                return Err(ConfigError::Invalid("plugin name must be set".to_string()));
            }
            if !names.insert(plugin.name.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate plugin {}", plugin.name)));
            }
            reqwest::Url::parse(&plugin.endpoint).map_err(|e| {
                ConfigError::Invalid(format!("plugin {} endpoint {:?}: {e}", plugin.name, plugin.endpoint))
            })?;
        }

        for (key, plugins) in &self.repo_plugins {
            if let Some(unknown) = plugins.iter().find(|p| !names.contains(p.as_str())) {
                return Err(ConfigError::Invalid(format!("{key} refers to unknown plugin {unknown}")));
            }
        }
        Ok(())
    }

    /// Endpoints of the plugins enabled for `org` or `org/repo` that want
    /// `event_type`, each once, in plugin declaration order.
    pub fn endpoints(&self, org: &str, repo: &str, event_type: &str) -> Vec<&str> {
        let full_name = format!("{org}/{repo}");
        let enabled: HashSet<&str> = [org, full_name.as_str()]
            .iter()
            .filter_map(|key| self.repo_plugins.get(*key))
            .flatten()
            .map(String::as_str)
            .collect();

        self.plugins
            .iter()
            .filter(|p| enabled.contains(p.name.as_str()) && p.wants(event_type))
            .map(|p| p.endpoint.as_str())
            .collect()
    }
}
