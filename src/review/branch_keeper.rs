//! Branch keepers: people who alone may approve PRs against a branch.
//!
//! SIG files may list keepers per `org/repo` branch. The SIG maintainers keep
//! every branch their SIG lists.

use std::collections::{BTreeSet, HashMap};

use super::config::RepoBranchRef;
use super::permission::decode_yaml;
use super::sig_info::{SIG_INFO_FILE, SigInfo};
use crate::client::{SigCacheError, SigInfoCache};

const ARCHIVED_SIGS_DIR: &str = "archived_sigs/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKeeper {
    /// No keepers are set for the branch; normal permissions apply.
    NotConfigured,
    Keeper,
    NotKeeper,
}

/// Lowercase keeper logins keyed by `org/repo/branch`.
pub type KeeperMap = HashMap<String, BTreeSet<String>>;

/// Adds the keepers one SIG declares to `keepers`.
pub fn collect_keepers(info: &SigInfo, keepers: &mut KeeperMap) {
    let maintainers = info.maintainer_logins();
    for branches in &info.branches {
        let mut set: BTreeSet<String> = branches
            .keeper
            .iter()
            .filter(|k| !k.gitee_id.is_empty())
            .map(|k| k.gitee_id.to_lowercase())
            .collect();
        set.extend(maintainers.iter().cloned());

        for rb in &branches.repo_branch {
            keepers.insert(format!("{}/{}", rb.repo, rb.branch), set.clone());
        }
    }
}

/// Decides whether `login` keeps `org/repo` at `branch`, reading SIG files
/// from `source` through the cache.
pub async fn check_branch_keeper<C: SigInfoCache>(
    cache: &C,
    source: &RepoBranchRef,
    org: &str,
    repo: &str,
    branch: &str,
    login: &str,
) -> Result<BranchKeeper, SigCacheError> {
    let files = cache
        .get_sig_files(&source.owner, &source.repo, &source.branch, SIG_INFO_FILE)
        .await?;

    let mut keepers = KeeperMap::new();
    for file in files
        .iter()
        .filter(|f| !f.path.starts_with(ARCHIVED_SIGS_DIR))
    {
        if let Some(info) = decode_yaml::<SigInfo>(&file.content, &file.path) {
            collect_keepers(&info, &mut keepers);
        }
    }

    Ok(match keepers.get(&format!("{org}/{repo}/{branch}")) {
        None => BranchKeeper::NotConfigured,
        Some(set) if set.contains(&login.to_lowercase()) => BranchKeeper::Keeper,
        Some(_) => BranchKeeper::NotKeeper,
    })
}
