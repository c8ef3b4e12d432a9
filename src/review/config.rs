//! Review bot configuration.

use std::fmt;

use regex::Regex;
use serde::Deserialize;

use super::freeze::FreezeFile;
use super::merge_gate::MergePolicy;
use crate::config::{BotConfig, ConfigError, RepoFilter, RepoScoped, find_config};

#[derive(Debug, Default, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub config_items: Vec<ReviewConfig>,
}

impl Configuration {
    pub fn config_for(&self, org: &str, repo: &str) -> Option<&ReviewConfig> {
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

/// A repository holding community metadata, read at a fixed branch.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepoBranchRef {
    pub owner: String,
    pub repo: String,
    pub branch: String,
}

impl Default for RepoBranchRef {
    fn default() -> Self {
        RepoBranchRef {
            owner: "openeuler".to_string(),
            repo: "community".to_string(),
            branch: "master".to_string(),
        }
    }
}

impl fmt::Display for RepoBranchRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.repo, self.branch)
    }
}

fn default_lgtm_counts() -> u32 {
    1
}

fn default_cla_label() -> String {
    "openeuler-cla/yes".to_string()
}

fn default_cla_prefix() -> String {
    "openeuler-cla/".to_string()
}

fn default_sig_dir_pattern() -> String {
    "^sig/[^/]+/".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ReviewConfig {
    #[serde(flatten)]
    pub filter: RepoFilter,

    /// Number of distinct LGTM labels a PR needs. With `1` the plain `lgtm`
    /// label is used, otherwise one `lgtm-<login>` label per reviewer.
    #[serde(default = "default_lgtm_counts")]
    pub lgtm_counts_required: u32,

    /// Labels required on top of `approved`.
    #[serde(default)]
    pub labels_for_merge: Vec<String>,

    /// Any of these labels vetoes merging outright.
    #[serde(default)]
    pub labels_not_allow_merge: Vec<String>,

    /// Labels that must be removed before merging.
    #[serde(default)]
    pub missing_labels_for_merge: Vec<String>,

    /// The only account allowed to apply merge labels.
    pub legal_operator: String,

    /// The label `/cla cancel` removes.
    #[serde(default = "default_cla_label")]
    pub cla_label: String,

    #[serde(default = "default_cla_prefix")]
    pub cla_label_prefix: String,

    #[serde(default)]
    pub freeze_file: Vec<FreezeFile>,

    /// Whether SIG owners may `/lgtm` without write access.
    #[serde(default)]
    pub check_permission_based_on_sig_owners: bool,

    #[serde(default = "default_sig_dir_pattern")]
    pub sig_dir_pattern: String,

    #[serde(default)]
    pub unable_checking_reviewer_for_pr: bool,

    #[serde(default)]
    pub ack_enabled: bool,

    /// Where per-SIG repository policy files live.
    #[serde(default)]
    pub community: RepoBranchRef,

    /// Where SIG files naming branch keepers are read from. Unset disables
    /// branch keepers.
    #[serde(default)]
    pub branch_keeper: Option<RepoBranchRef>,

    #[serde(skip)]
    sig_dir: Option<Regex>,
}

impl ReviewConfig {
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.filter.validate()?;
        if self.legal_operator.is_empty() {
            return Err(ConfigError::Invalid("legal_operator must be set".to_string()));
        }
        if self.lgtm_counts_required == 0 {
            self.lgtm_counts_required = 1;
        }
        for f in &self.freeze_file {
            f.validate()?;
        }
        self.sig_dir = Some(Regex::new(&self.sig_dir_pattern).map_err(|e| {
            ConfigError::Invalid(format!("sig_dir_pattern {:?}: {e}", self.sig_dir_pattern))
        })?);
        Ok(())
    }

    /// Compiled `sig_dir_pattern`. Before validation this compiles on demand.
    pub fn sig_dir(&self) -> Result<Regex, regex::Error> {
        match &self.sig_dir {
            Some(re) => Ok(re.clone()),
            None => Regex::new(&self.sig_dir_pattern),
        }
    }

    pub fn merge_policy(&self) -> MergePolicy<'_> {
        MergePolicy {
            lgtm_counts_required: self.lgtm_counts_required,
            labels_for_merge: &self.labels_for_merge,
            labels_not_allow_merge: &self.labels_not_allow_merge,
            missing_labels_for_merge: &self.missing_labels_for_merge,
            legal_operator: &self.legal_operator,
            cla_label_prefix: &self.cla_label_prefix,
        }
    }
}

impl RepoScoped for ReviewConfig {
    fn repo_filter(&self) -> &RepoFilter {
        &self.filter
    }
}
