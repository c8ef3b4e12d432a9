//! Deciding mergeability against the live platform and performing the merge.

use std::collections::BTreeSet;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, instrument};

use super::commands::ReviewCommand;
use super::config::ReviewConfig;
use super::freeze::{FreezeContent, FreezeFile, FreezeItem, check_freeze};
use super::merge_gate::{MSG_PR_CONFLICTS, MergeDecision, check_veto, evaluate_labels};
use crate::client::{ApiError, MergeMethod, MergeOptions, PlatformClient};
use crate::labels::LabelSet;
use crate::types::{PrIssueRef, RepoId};
use crate::webhooks::PullRequestInfo;

/// Failures that leave mergeability undecided. Callers treat them as "not
/// mergeable" without telling the PR.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("failed to list operation logs")]
    OperationLog(#[source] ApiError),

    #[error("failed to fetch freeze file {file}")]
    FreezeFetch {
        file: String,
        #[source]
        source: ApiError,
    },

    #[error("failed to parse freeze file {file}")]
    FreezeParse {
        file: String,
        #[source]
        source: serde_yaml::Error,
    },
}

pub struct MergeHelper<'a, P> {
    client: &'a P,
    config: &'a ReviewConfig,
    pr: PrIssueRef,
    info: &'a PullRequestInfo,
    trigger: Option<&'a str>,
}

impl<'a, P: PlatformClient> MergeHelper<'a, P> {
    pub fn new(client: &'a P, config: &'a ReviewConfig, repo: &RepoId, info: &'a PullRequestInfo) -> Self {
        MergeHelper {
            client,
            config,
            pr: PrIssueRef::new(&repo.org, &repo.repo, info.number),
            info,
            trigger: None,
        }
    }

    /// The commenter whose command started this attempt. Freeze owners are
    /// checked against it.
    pub fn triggered_by(mut self, login: &'a str) -> Self {
        self.trigger = Some(login);
        self
    }

    /// Labels to judge. A comment may have changed them since the event was
    /// built, so commands re-read them; failures fall back to the event.
    async fn current_labels(&self) -> LabelSet {
        if self.trigger.is_some() {
            match self.client.get_pr_labels(&self.pr).await {
                Ok(labels) => return LabelSet::new(&labels),
                Err(e) => debug!(pr = %self.pr, error = %e, "using labels from the event"),
            }
        }
        LabelSet::new(&self.info.labels)
    }

    #[instrument(skip_all, fields(pr = %self.pr))]
    pub async fn can_merge(&self) -> Result<MergeDecision, MergeError> {
        if self.info.mergeable != Some(true) {
            return Ok(MergeDecision::deny(MSG_PR_CONFLICTS));
        }

        let ops = self
            .client
            .list_operation_logs(&self.pr)
            .await
            .map_err(MergeError::OperationLog)?;

        let labels = self.current_labels().await;
        let policy = self.config.merge_policy();
        if let Some(reason) = check_veto(&labels, &policy) {
            return Ok(MergeDecision::deny(reason));
        }

        let reasons = evaluate_labels(&labels, &ops, &policy);
        if !reasons.is_empty() {
            return Ok(MergeDecision::from_reasons(reasons));
        }

        let item = self.freeze_item().await?;
        Ok(match check_freeze(item.as_ref(), self.trigger, Utc::now()) {
            Some(reason) => MergeDecision::deny(reason),
            None => MergeDecision::allow(),
        })
    }

    /// The first freeze entry covering the base branch, reading the
    /// configured files in order.
    async fn freeze_item(&self) -> Result<Option<FreezeItem>, MergeError> {
        for file in &self.config.freeze_file {
            let content = self.freeze_content(file).await?;
            if let Some(item) = content.freeze_item(self.pr.org(), &self.info.base_ref) {
                return Ok(Some(item.clone()));
            }
        }
        Ok(None)
    }

    async fn freeze_content(&self, file: &FreezeFile) -> Result<FreezeContent, MergeError> {
        let fetch = |source| MergeError::FreezeFetch {
            file: file.to_string(),
            source,
        };
        let content = self
            .client
            .get_path_content(&RepoId::new(&file.owner, &file.repo), &file.path, &file.branch)
            .await
            .map_err(fetch)?;
        let bytes = content.decode().map_err(fetch)?;
        serde_yaml::from_slice(&bytes).map_err(|source| MergeError::FreezeParse {
            file: file.to_string(),
            source,
        })
    }

    /// Credits reviewers and approvers in the merge commit message. Only
    /// unedited comments by someone other than the author count.
    pub async fn gen_merge_desc(&self) -> String {
        let comments = match self.client.list_pr_comments(&self.pr).await {
            Ok(c) => c,
            Err(e) => {
                debug!(pr = %self.pr, error = %e, "no merge description");
                return String::new();
            }
        };

        let mut reviewers = BTreeSet::new();
        let mut signers = BTreeSet::new();
        for c in comments
            .iter()
            .filter(|c| !c.is_edited() && c.author != self.info.author)
        {
            if ReviewCommand::Lgtm.matches(&c.body) {
                reviewers.insert(c.author.as_str());
            }
            if ReviewCommand::Approve.matches(&c.body) {
                signers.insert(c.author.as_str());
            }
        }

        if reviewers.is_empty() && signers.is_empty() {
            return String::new();
        }
        format!(
            "From: @{} \nReviewed-by: @{} \nSigned-off-by: @{} \n",
            self.info.author,
            reviewers.into_iter().collect::<Vec<_>>().join(", @"),
            signers.into_iter().collect::<Vec<_>>().join(", @"),
        )
    }

    /// Assigns reviewers still pending, then merges at the PR's merge commit.
    #[instrument(skip_all, fields(pr = %self.pr, method = %method))]
    pub async fn merge(&self, method: MergeMethod) -> Result<(), ApiError> {
        let pending: Vec<String> = self
            .info
            .requested_reviewers
            .iter()
            .filter(|r| !self.info.assignees.contains(r))
            .cloned()
            .collect();
        if !pending.is_empty() {
            self.client.assign_pr(&self.pr, &pending).await?;
        }

        let options = MergeOptions {
            method,
            message: format!("\n{}", self.gen_merge_desc().await),
            sha: self.info.merge_commit_sha.clone(),
        };
        self.client.merge_pr(&self.pr, &options).await
    }
}
