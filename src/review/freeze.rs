//! Branch freeze windows.
//!
//! Release management keeps YAML files listing frozen branches:
//!
//! ```yaml
//! release:
//!   - community: openeuler
//!     branch: openEuler-24.03-LTS*
//!     frozen: true
//!     owner: [release-manager]
//!     start: 2024-05-01T00:00:00Z
//!     end: 2024-06-01T00:00:00Z
//! ```
//!
//! While a window is active only its owners may trigger a merge.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::config::ConfigError;

/// Location of a freeze file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FreezeFile {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub path: String,
}

impl FreezeFile {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.owner.is_empty() || self.repo.is_empty() || self.branch.is_empty() || self.path.is_empty() {
            return Err(ConfigError::Invalid(format!("incomplete freeze file {self}")));
        }
        Ok(())
    }
}

impl fmt::Display for FreezeFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}/{}", self.owner, self.repo, self.branch, self.path)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FreezeContent {
    #[serde(default)]
    pub release: Vec<FreezeItem>,
}

impl FreezeContent {
    /// The first entry covering `branch` of `org`.
    pub fn freeze_item(&self, org: &str, branch: &str) -> Option<&FreezeItem> {
        self.release
            .iter()
            .find(|item| item.community == org && item.matches_branch(branch))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FreezeItem {
    /// Organisation the entry applies to.
    #[serde(default)]
    pub community: String,
    /// Exact branch name, or a prefix followed by `*`.
    pub branch: String,
    #[serde(default)]
    pub frozen: bool,
    #[serde(default)]
    pub owner: Vec<String>,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
}

impl FreezeItem {
    pub fn matches_branch(&self, branch: &str) -> bool {
        match self.branch.strip_suffix('*') {
            Some(prefix) => branch.starts_with(prefix),
            None => self.branch == branch,
        }
    }

    /// Frozen, and `now` lies in `[start, end)` where either bound may be open.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.frozen
            && self.start.is_none_or(|start| now >= start)
            && self.end.is_none_or(|end| now < end)
    }

    pub fn is_owner(&self, login: &str) -> bool {
        self.owner.iter().any(|o| o.eq_ignore_ascii_case(login))
    }
}

/// Returns the denial reason when `item` blocks a merge triggered by
/// `trigger` at `now`. A merge with no triggering user is denied during an
/// active window.
pub fn check_freeze(
    item: Option<&FreezeItem>,
    trigger: Option<&str>,
    now: DateTime<Utc>,
) -> Option<String> {
    let item = item.filter(|i| i.is_active(now))?;
    if trigger.is_some_and(|login| item.is_owner(login)) {
        return None;
    }
    Some(format!(
        "The target branch of PR has been frozen and it can be merge only by branch owners: @{}",
        item.owner.join(" , @")
    ))
}
