//! SIG metadata file formats.
//!
//! Each SIG directory in the community repository carries either a
//! `sig-info.yaml` or a legacy `OWNERS` file naming the people responsible
//! for it.

use std::collections::BTreeSet;

use serde::Deserialize;

pub const SIG_INFO_FILE: &str = "sig-info.yaml";
pub const OWNERS_FILE: &str = "OWNERS";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SigInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub maintainers: Vec<Person>,
    #[serde(default)]
    pub repositories: Vec<RepoAdmin>,
    #[serde(default)]
    pub branches: Vec<BranchKeepers>,
}

/// A person listed in a SIG file. The `gitee_id` key predates the platform
/// migration and still holds the platform login.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Person {
    #[serde(default)]
    pub gitee_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RepoAdmin {
    #[serde(default)]
    pub repo: Vec<String>,
    #[serde(default)]
    pub admins: Vec<Person>,
    #[serde(default)]
    pub committers: Vec<Person>,
    #[serde(default)]
    pub contributors: Vec<Person>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BranchKeepers {
    #[serde(default)]
    pub repo_branch: Vec<RepoBranch>,
    #[serde(default)]
    pub keeper: Vec<Person>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepoBranch {
    /// `org/repo`.
    pub repo: String,
    pub branch: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OwnersFile {
    #[serde(default)]
    pub maintainers: Vec<String>,
    #[serde(default)]
    pub committers: Vec<String>,
}

impl SigInfo {
    /// Lowercase logins of the SIG maintainers.
    pub fn maintainer_logins(&self) -> BTreeSet<String> {
        self.maintainers
            .iter()
            .filter(|m| !m.gitee_id.is_empty())
            .map(|m| m.gitee_id.to_lowercase())
            .collect()
    }
}

impl OwnersFile {
    /// Lowercase logins of maintainers and committers.
    pub fn owner_logins(&self) -> BTreeSet<String> {
        self.maintainers
            .iter()
            .chain(&self.committers)
            .map(|l| l.to_lowercase())
            .collect()
    }
}

/// Per-repository policy file kept under a SIG directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RepositoryPolicy {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub merge_method: String,
}
