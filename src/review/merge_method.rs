//! Choosing how a pull request is merged.
//!
//! A `merge/<method>` label wins. Otherwise the SIG named by a `sig/<name>`
//! label may set a `merge_method` for the repository in the community
//! repository. Everything else merges with a merge commit.

use tracing::{info, warn};

use super::config::RepoBranchRef;
use super::sig_info::RepositoryPolicy;
use crate::client::{MergeMethod, PlatformClient};
use crate::types::{PrIssueRef, RepoId};

/// Where the merge method of a PR comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodSource {
    /// An explicit `merge/<method>` label.
    Label(MergeMethod),
    /// The policy file of this SIG.
    Sig(String),
    Default,
}

/// Inspects PR labels. Any `merge/` label wins; among `sig/` labels the last
/// one counts.
pub fn method_source(labels: &[String]) -> MethodSource {
    let mut sig = None;
    for label in labels {
        if let Some(method) = strip_prefix_ignore_case(label, "merge/") {
            return MethodSource::Label(MergeMethod::parse(method).unwrap_or_default());
        }
        if let Some(name) = strip_prefix_ignore_case(label, "sig/") {
            if !name.is_empty() {
                sig = Some(name.to_string());
            }
        }
    }
    sig.map_or(MethodSource::Default, MethodSource::Sig)
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    s.get(..prefix.len())
        .filter(|p| p.eq_ignore_ascii_case(prefix))
        .map(|_| &s[prefix.len()..])
}

/// `sig/<sig>/<org>/<first letter of repo>/<repo>.yaml`
pub fn sig_policy_path(sig: &str, org: &str, repo: &str) -> Option<String> {
    let first = repo.chars().next()?.to_lowercase();
    Some(format!("sig/{sig}/{org}/{first}/{repo}.yaml"))
}

/// Reads `merge_method` from a repository policy file. Only `rebase` and
/// `squash` are honoured.
pub fn parse_policy_method(content: &[u8]) -> Result<MergeMethod, serde_yaml::Error> {
    let policy: RepositoryPolicy = serde_yaml::from_slice(content)?;
    Ok(match policy.merge_method.as_str() {
        "rebase" => MergeMethod::Rebase,
        "squash" => MergeMethod::Squash,
        _ => MergeMethod::Merge,
    })
}

/// Resolves the merge method for `pr`. Lookup failures fall back to a merge
/// commit.
pub async fn gen_merge_method<P: PlatformClient>(
    client: &P,
    community: &RepoBranchRef,
    pr: &PrIssueRef,
    labels: &[String],
) -> MergeMethod {
    let sig = match method_source(labels) {
        MethodSource::Label(method) => return method,
        MethodSource::Default => return MergeMethod::Merge,
        MethodSource::Sig(sig) => sig,
    };
    let Some(path) = sig_policy_path(&sig, pr.org(), pr.repo()) else {
        return MergeMethod::Merge;
    };

    let community_repo = RepoId::new(&community.owner, &community.repo);
    let content = match client
        .get_path_content(&community_repo, &path, &community.branch)
        .await
    {
        Ok(c) => c,
        Err(e) => {
            info!(%pr, path = %path, error = %e, "no repository policy, merging");
            return MergeMethod::Merge;
        }
    };

    match content.decode() {
        Ok(bytes) => parse_policy_method(&bytes).unwrap_or_else(|e| {
            warn!(path = %path, error = %e, "invalid repository policy");
            MergeMethod::Merge
        }),
        Err(e) => {
            warn!(path = %path, error = %e, "failed to decode repository policy");
            MergeMethod::Merge
        }
    }
}
