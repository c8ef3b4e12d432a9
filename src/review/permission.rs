//! Who may run review commands.
//!
//! Collaborators with write or admin access always may. For `/lgtm` a
//! repository can also let SIG owners in: a commenter owns a PR when every
//! file it touches lies directly under a SIG directory the commenter owns.

use std::collections::BTreeSet;

use regex::Regex;
use tracing::{debug, warn};

use super::sig_info::{OWNERS_FILE, OwnersFile, SIG_INFO_FILE, SigInfo};
use crate::client::{ApiError, PlatformClient};
use crate::types::{PrIssueRef, RepoId};

/// Whether `login` may act on `pr`. SIG ownership is consulted only when
/// `sig_dir` is given.
pub async fn has_permission<P: PlatformClient>(
    client: &P,
    pr: &PrIssueRef,
    base_branch: &str,
    login: &str,
    sig_dir: Option<&Regex>,
) -> Result<bool, ApiError> {
    let permission = client
        .get_user_permission_of_repo(&pr.repo_id(), login)
        .await?;
    if permission.can_write() {
        return Ok(true);
    }
    match sig_dir {
        Some(sig_dir) => is_owner_of_sig(client, pr, base_branch, login, sig_dir).await,
        None => Ok(false),
    }
}

/// SIG directories touched by `files`, or `None` when any file lies outside
/// one (or deeper than `sig/<name>/<file>`).
pub fn sig_dirs<'a>(
    files: impl IntoIterator<Item = &'a str>,
    sig_dir: &Regex,
) -> Option<BTreeSet<String>> {
    let mut dirs = BTreeSet::new();
    for file in files {
        if !sig_dir.is_match(file) || file.matches('/').count() > 2 {
            return None;
        }
        let (dir, _) = file.rsplit_once('/')?;
        dirs.insert(dir.to_string());
    }
    Some(dirs)
}

pub async fn is_owner_of_sig<P: PlatformClient>(
    client: &P,
    pr: &PrIssueRef,
    base_branch: &str,
    login: &str,
    sig_dir: &Regex,
) -> Result<bool, ApiError> {
    let changes = client.get_pull_request_changes(pr).await?;
    if changes.is_empty() {
        return Ok(false);
    }
    let Some(dirs) = sig_dirs(changes.iter().map(|f| f.filename.as_str()), sig_dir) else {
        debug!(%pr, "PR touches files outside SIG directories");
        return Ok(false);
    };

    let login = login.to_lowercase();
    let repo = pr.repo_id();
    for dir in &dirs {
        let owners = sig_owners(client, &repo, dir, base_branch).await?;
        if !owners.contains(&login) {
            debug!(%pr, dir = %dir, login = %login, "commenter does not own SIG directory");
            return Ok(false);
        }
    }
    Ok(true)
}

/// Owners of a SIG directory: maintainers from `sig-info.yaml`, or
/// maintainers and committers from `OWNERS` when there is no `sig-info.yaml`.
async fn sig_owners<P: PlatformClient>(
    client: &P,
    repo: &RepoId,
    dir: &str,
    branch: &str,
) -> Result<BTreeSet<String>, ApiError> {
    let sig_info_path = format!("{dir}/{SIG_INFO_FILE}");
    match client.get_path_content(repo, &sig_info_path, branch).await {
        Ok(content) => {
            return Ok(decode_yaml::<SigInfo>(&content.content, &sig_info_path)
                .map(|info| info.maintainer_logins())
                .unwrap_or_default());
        }
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e),
    }

    let owners_path = format!("{dir}/{OWNERS_FILE}");
    match client.get_path_content(repo, &owners_path, branch).await {
        Ok(content) => Ok(decode_yaml::<OwnersFile>(&content.content, &owners_path)
            .map(|owners| owners.owner_logins())
            .unwrap_or_default()),
        Err(e) if e.is_not_found() => Ok(BTreeSet::new()),
        Err(e) => Err(e),
    }
}

/// Decodes a base64 YAML file. Malformed files are logged and read as
/// absent.
pub(crate) fn decode_yaml<T: serde::de::DeserializeOwned>(content: &str, path: &str) -> Option<T> {
    let bytes = match crate::client::decode_base64(content) {
        Ok(b) => b,
        Err(e) => {
            warn!(path, error = %e, "failed to decode file");
            return None;
        }
    };
    match serde_yaml::from_slice(&bytes) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(path, error = %e, "failed to parse file");
            None
        }
    }
}
