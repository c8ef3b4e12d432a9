//! The label bot: applies `/kind`, `/sig`, `/priority` and `/good` label
//! commands from comments, and clears configured labels when a PR's source
//! branch changes.

use std::sync::Arc;

use anyhow::{Context, anyhow};
use tracing::{debug, info, instrument, warn};

use super::commands::parse_label_commands;
use super::config::{Configuration, LabelConfig};
use super::label_set::LabelSet;
use crate::client::PlatformClient;
use crate::errors::MultiError;
use crate::framework::{HandlerRegistry, RegistryError, Robot};
use crate::types::{PrIssueRef, RepoId};
use crate::webhooks::{CommentAction, IssueCommentEvent, PrAction, PullRequestEvent, ReviewCommentEvent};

/// Where label changes and replies go.
#[derive(Debug, Clone)]
enum Target {
    Issue(PrIssueRef),
    PullRequest {
        pr: PrIssueRef,
        /// The review comment to reply to, when there is one.
        reply_to: Option<String>,
    },
}

impl Target {
    fn reference(&self) -> &PrIssueRef {
        match self {
            Target::Issue(r) => r,
            Target::PullRequest { pr, .. } => pr,
        }
    }
}

/// A label command to apply.
struct LabelRequest<'a> {
    repo: &'a RepoId,
    target: Target,
    commenter: &'a str,
    body: &'a str,
    current: LabelSet,
}

pub struct LabelBot<P> {
    client: P,
}

impl<P: PlatformClient> LabelBot<P> {
    pub fn new(client: P) -> Self {
        Self { client }
    }

    #[instrument(skip_all, fields(repo = %event.repo, number = event.issue.number))]
    pub async fn handle_issue_comment(
        &self,
        event: IssueCommentEvent,
        config: &Configuration,
    ) -> anyhow::Result<()> {
        if event.action != CommentAction::Created {
            debug!(action = ?event.action, "ignoring comment action");
            return Ok(());
        }
        let cfg = repo_config(config, &event.repo)?;

        let target = if event.issue.is_pull_request {
            Target::PullRequest {
                pr: event.issue_ref(),
                reply_to: None,
            }
        } else {
            Target::Issue(event.issue_ref())
        };
        self.apply_label_commands(
            cfg,
            LabelRequest {
                repo: &event.repo,
                target,
                commenter: &event.comment.author,
                body: &event.comment.body,
                current: LabelSet::new(&event.issue.labels),
            },
        )
        .await
    }

    #[instrument(skip_all, fields(repo = %event.repo, number = event.pull_request.number))]
    pub async fn handle_review_comment(
        &self,
        event: ReviewCommentEvent,
        config: &Configuration,
    ) -> anyhow::Result<()> {
        if event.action != CommentAction::Created {
            debug!(action = ?event.action, "ignoring comment action");
            return Ok(());
        }
        let cfg = repo_config(config, &event.repo)?;

        self.apply_label_commands(
            cfg,
            LabelRequest {
                repo: &event.repo,
                target: Target::PullRequest {
                    pr: event.pr_ref(),
                    reply_to: Some(event.comment.id.clone()),
                },
                commenter: &event.comment.author,
                body: &event.comment.body,
                current: LabelSet::new(&event.pull_request.labels),
            },
        )
        .await
    }

    /// Removes the configured labels after new commits land on the PR.
    #[instrument(skip_all, fields(repo = %event.repo, number = event.pull_request.number))]
    pub async fn handle_pull_request(
        &self,
        event: PullRequestEvent,
        config: &Configuration,
    ) -> anyhow::Result<()> {
        if event.action != PrAction::Updated {
            return Ok(());
        }
        let cfg = repo_config(config, &event.repo)?;

        let to_clear = labels_to_clear(cfg, &LabelSet::new(&event.pull_request.labels));
        if to_clear.is_empty() {
            return Ok(());
        }

        let pr = event.pr_ref();
        let mut errors = MultiError::new();
        for label in &to_clear {
            errors.add_result(
                self.client
                    .remove_pr_label(&pr, label)
                    .await
                    .with_context(|| format!("remove label {label}")),
            );
        }

        info!(labels = ?to_clear, "source branch changed, cleared labels");
        let body = format!(
            "This pull request source branch has changed, so removes the following label(s): {}.",
            to_clear.join(", ")
        );
        errors.add_result(self.client.create_pr_comment(&pr, &body).await);
        errors.into_result()
    }

    async fn apply_label_commands(
        &self,
        cfg: &LabelConfig,
        request: LabelRequest<'_>,
    ) -> anyhow::Result<()> {
        let commands = parse_label_commands(request.body);
        if commands.is_empty() {
            return Ok(());
        }
        let to_add = LabelSet::new(&commands.add);
        let to_remove = LabelSet::new(&commands.remove);

        let conflicting = to_add.intersection(&to_remove);
        if !conflicting.is_empty() {
            let body = format!("conflict labels({}) exit", conflicting.originals().join(", "));
            return self.comment(&request.target, &body).await;
        }

        let repo_labels = LabelSet::new(
            self.client
                .get_repository_labels(request.repo)
                .await
                .context("list repository labels")?,
        );

        let mut errors = MultiError::new();

        let known_removals = LabelSet::new(repo_labels.origin(&to_remove.to_list()));
        for label in request.current.intersection(&known_removals).originals() {
            errors.add_result(
                self.remove_label(&request.target, &label)
                    .await
                    .with_context(|| format!("remove label {label}")),
            );
        }

        if !to_add.is_empty() {
            self.add_labels(cfg, &request, &to_add, &repo_labels, &mut errors)
                .await;
        }

        errors.into_result()
    }

    /// Adds the requested labels the repository knows, creating missing ones
    /// when the commenter may, then reports any that could not be applied.
    async fn add_labels(
        &self,
        cfg: &LabelConfig,
        request: &LabelRequest<'_>,
        to_add: &LabelSet,
        repo_labels: &LabelSet,
        errors: &mut MultiError,
    ) {
        let missing = to_add.difference(repo_labels);
        let mut labels = repo_labels.origin(&to_add.to_list());
        let mut unavailable = Vec::new();

        if !missing.is_empty() {
            let may_create = self.may_create_labels(cfg, request).await.unwrap_or_else(|e| {
                errors.push(e);
                false
            });
            if may_create {
                for label in missing.originals() {
                    if let Err(e) = self.client.create_repo_label(request.repo, &label).await {
                        warn!(label = %label, error = %e, "failed to create label");
                    }
                    labels.push(label);
                }
            } else {
                unavailable = missing.originals();
            }
        }

        labels.retain(|l| !request.current.contains(l));
        if !labels.is_empty() {
            info!(labels = ?labels, commenter = request.commenter, "adding labels");
            match &request.target {
                Target::Issue(issue) => errors.add_result(
                    self.client
                        .add_issue_labels(issue, &labels)
                        .await
                        .with_context(|| format!("add labels {}", labels.join(", "))),
                ),
                Target::PullRequest { pr, .. } => {
                    for label in &labels {
                        errors.add_result(
                            self.client
                                .add_pr_label(pr, label)
                                .await
                                .with_context(|| format!("add label {label}")),
                        );
                    }
                }
            }
        }

        if !unavailable.is_empty() {
            let body = format!(
                "The label(s) `{}` cannot be applied, because the repository doesn't have them",
                unavailable.join(", ")
            );
            errors.add_result(self.comment(&request.target, &body).await);
        }
    }

    async fn may_create_labels(&self, cfg: &LabelConfig, request: &LabelRequest<'_>) -> anyhow::Result<bool> {
        if !cfg.allow_creating_labels_by_collaborator {
            return Ok(false);
        }
        self.client
            .is_collaborator(request.repo, request.commenter)
            .await
            .context("check collaborator")
    }

    async fn remove_label(&self, target: &Target, label: &str) -> anyhow::Result<()> {
        match target {
            Target::Issue(issue) => self.client.remove_issue_label(issue, label).await?,
            Target::PullRequest { pr, .. } => self.client.remove_pr_label(pr, label).await?,
        }
        Ok(())
    }

    async fn comment(&self, target: &Target, body: &str) -> anyhow::Result<()> {
        let result = match target {
            Target::Issue(issue) => self.client.create_issue_comment(issue, body).await,
            Target::PullRequest {
                pr,
                reply_to: Some(id),
            } => self.client.create_pr_comment_reply(pr, body, id).await,
            Target::PullRequest { pr, reply_to: None } => {
                self.client.create_pr_comment(pr, body).await
            }
        };
        result.with_context(|| format!("comment on {}", target.reference()))
    }
}

fn repo_config<'a>(config: &'a Configuration, repo: &RepoId) -> anyhow::Result<&'a LabelConfig> {
    config
        .config_for(&repo.org, &repo.repo)
        .ok_or_else(|| anyhow!("no config for this repo:{}/{}", repo.org, repo.repo))
}

/// Current labels named in `clear_labels`, plus any other current label
/// matching `clear_labels_by_regexp`.
fn labels_to_clear(cfg: &LabelConfig, current: &LabelSet) -> Vec<String> {
    let mut clear = current.intersection(&LabelSet::new(&cfg.clear_labels));
    if let Some(re) = cfg.clear_regexp() {
        let matching: LabelSet = current
            .difference(&clear)
            .originals()
            .into_iter()
            .filter(|l| re.is_match(l))
            .collect();
        clear = clear.union(&matching);
    }
    clear.originals()
}

impl<P: PlatformClient> Robot for LabelBot<P> {
    type Config = Configuration;

    fn name(&self) -> &'static str {
        "label"
    }

    fn register(self: Arc<Self>, registry: &mut HandlerRegistry<Configuration>) -> Result<(), RegistryError> {
        let bot = Arc::clone(&self);
        registry.on_issue_comment(move |event, ctx| {
            let bot = Arc::clone(&bot);
            async move { bot.handle_issue_comment(event, &ctx.config).await }
        })?;

        let bot = Arc::clone(&self);
        registry.on_review_comment(move |event, ctx| {
            let bot = Arc::clone(&bot);
            async move { bot.handle_review_comment(event, &ctx.config).await }
        })?;

        registry.on_pull_request(move |event, ctx| {
            let bot = Arc::clone(&self);
            async move { bot.handle_pull_request(event, &ctx.config).await }
        })
    }
}
