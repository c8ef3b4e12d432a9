//! Label bot configuration.

use regex::Regex;
use serde::Deserialize;

use crate::config::{BotConfig, ConfigError, RepoFilter, RepoScoped, find_config};

#[derive(Debug, Default, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub config_items: Vec<LabelConfig>,
}

impl Configuration {
    pub fn config_for(&self, org: &str, repo: &str) -> Option<&LabelConfig> {
        find_config(&self.config_items, org, repo)
    }
}

impl BotConfig for Configuration {
    fn validate(&mut self) -> Result<(), ConfigError> {
        for item in &mut self.config_items {
            item.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LabelConfig {
    #[serde(flatten)]
    pub filter: RepoFilter,

    /// Lets repository collaborators create labels that do not exist yet by
    /// asking for them.
    #[serde(default)]
    pub allow_creating_labels_by_collaborator: bool,

    /// Labels removed when the PR source branch changes.
    #[serde(default)]
    pub clear_labels: Vec<String>,

    /// Also removes labels matching this pattern when the source branch changes.
    #[serde(default)]
    pub clear_labels_by_regexp: Option<String>,

    #[serde(skip)]
    clear_regexp: Option<Regex>,
}

impl LabelConfig {
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.filter.validate()?;
        self.clear_regexp = match self.clear_labels_by_regexp.as_deref() {
            None | Some("") => None,
            Some(pattern) => Some(Regex::new(pattern).map_err(|e| {
                ConfigError::Invalid(format!("clear_labels_by_regexp {pattern:?}: {e}"))
            })?),
        };
        Ok(())
    }

    /// Compiled `clear_labels_by_regexp`, available after [`validate`](Self::validate).
    pub fn clear_regexp(&self) -> Option<&Regex> {
        self.clear_regexp.as_ref()
    }
}

impl RepoScoped for LabelConfig {
    fn repo_filter(&self) -> &RepoFilter {
        &self.filter
    }
}
