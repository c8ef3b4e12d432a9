//! The review bot: LGTM/approve slash-commands, merge attempts, and PR
//! housekeeping.

use std::sync::Arc;

use anyhow::{Context, anyhow};
use tracing::{debug, info, instrument, warn};

use super::branch_keeper::{BranchKeeper, check_branch_keeper};
use super::commands::{ReviewCommand, parse_commands};
use super::config::{Configuration, ReviewConfig};
use super::merge::MergeHelper;
use super::merge_gate::{APPROVED_LABEL, LGTM_LABEL, gen_lgtm_label, lgtm_labels};
use super::merge_method::gen_merge_method;
use super::permission::has_permission;
use crate::client::{ApiErrorKind, PlatformClient, SigInfoCache};
use crate::errors::MultiError;
use crate::framework::{HandlerRegistry, RegistryError, Robot};
use crate::labels::LabelSet;
use crate::types::{PrIssueRef, RepoId};
use crate::webhooks::{CommentAction, PrAction, PullRequestEvent, PullRequestInfo, ReviewCommentEvent};

const RETEST_COMMAND: &str = "/retest";
const ACK_LABEL: &str = "Acked";
const MERGE_REBASE_LABEL: &str = "merge/rebase";
const MERGE_SQUASH_LABEL: &str = "merge/squash";

const MSG_LGTM_BY_SELF: &str = "***lgtm*** can not be added in your self-own pull request. :astonished:";

fn msg_no_permission_for_lgtm(commenter: &str) -> String {
    format!(
        "Thanks for your review, ***{commenter}***, your opinion is very important to us.:wave:\n\
         The maintainers will consider your advice carefully."
    )
}

fn msg_no_permission_for_label(commenter: &str, action: &str, label: &str) -> String {
    format!(
        "***@{commenter}*** has no permission to {action} ***{label}*** label in this pull request. \
         :astonished:\nPlease contact to the collaborators in this repository."
    )
}

fn msg_label_added(label: &str, commenter: &str) -> String {
    format!(
        "***{label}*** was added to this pull request by: ***{commenter}***. :wave: \n\
         **NOTE:** If this pull request is not merged while all conditions are met, comment \
         \"/check-pr\" to try again. :smile: "
    )
}

fn msg_label_removed(label: &str, commenter: &str) -> String {
    format!("***{label}*** was removed in this pull request by: ***{commenter}***. :flushed: ")
}

fn msg_exclusive(present: &str, cancel: &str, command: &str) -> String {
    format!("Please use **{cancel}** to remove **{present}** label, and try **{command}** again")
}

/// Everything a slash-command needs to know about the comment it came from.
struct CommentContext<'a> {
    cfg: &'a ReviewConfig,
    repo: &'a RepoId,
    pr: PrIssueRef,
    info: &'a PullRequestInfo,
    commenter: &'a str,
}

impl CommentContext<'_> {
    fn is_author(&self) -> bool {
        self.commenter == self.info.author
    }
}

pub struct ReviewBot<P, S> {
    client: P,
    /// Needed only where branch keepers are configured.
    sig_cache: Option<S>,
}

impl<P: PlatformClient, S: SigInfoCache> ReviewBot<P, S> {
    pub fn new(client: P, sig_cache: Option<S>) -> Self {
        Self { client, sig_cache }
    }

    #[instrument(skip_all, fields(
        repo = %event.repo,
        number = event.pull_request.number,
        commenter = %event.comment.author,
    ))]
    pub async fn handle_review_comment(
        &self,
        event: ReviewCommentEvent,
        config: &Configuration,
    ) -> anyhow::Result<()> {
        if event.action != CommentAction::Created {
            debug!(action = ?event.action, "ignoring comment action");
            return Ok(());
        }
        let commands = parse_commands(&event.comment.body);
        if commands.is_empty() {
            return Ok(());
        }
        let cfg = repo_config(config, &event.repo)?;
        if !event.pull_request.is_open() {
            debug!("pull request is not open");
            return Ok(());
        }

        let ctx = CommentContext {
            cfg,
            repo: &event.repo,
            pr: event.pr_ref(),
            info: &event.pull_request,
            commenter: &event.comment.author,
        };

        let mut errors = MultiError::new();
        for command in commands {
            errors.add_result(
                self.run_command(&ctx, command)
                    .await
                    .with_context(|| format!("handle {}", command.as_str())),
            );
        }
        errors.into_result()
    }

    async fn run_command(&self, ctx: &CommentContext<'_>, command: ReviewCommand) -> anyhow::Result<()> {
        match command {
            ReviewCommand::Lgtm => self.add_lgtm(ctx).await,
            ReviewCommand::LgtmCancel => self.remove_lgtm(ctx).await,
            ReviewCommand::Approve => self.add_approve(ctx).await,
            ReviewCommand::ApproveCancel => self.remove_approve(ctx).await,
            ReviewCommand::CheckPr => self.try_merge(ctx.cfg, ctx.repo, ctx.info, Some(ctx.commenter), true).await,
            ReviewCommand::ClaCancel => self.remove_cla(ctx).await,
            ReviewCommand::Rebase => self.add_merge_label(ctx, MERGE_REBASE_LABEL, MERGE_SQUASH_LABEL).await,
            ReviewCommand::Squash => self.add_merge_label(ctx, MERGE_SQUASH_LABEL, MERGE_REBASE_LABEL).await,
            ReviewCommand::RebaseCancel => self.remove_merge_label(ctx, MERGE_REBASE_LABEL).await,
            ReviewCommand::SquashCancel => self.remove_merge_label(ctx, MERGE_SQUASH_LABEL).await,
            ReviewCommand::Ack => self.add_ack(ctx).await,
        }
    }

    // ─── Permissions ───

    async fn can_write(&self, ctx: &CommentContext<'_>) -> anyhow::Result<bool> {
        has_permission(&self.client, &ctx.pr, &ctx.info.base_ref, ctx.commenter, None)
            .await
            .context("check permission")
    }

    async fn can_lgtm(&self, ctx: &CommentContext<'_>) -> anyhow::Result<bool> {
        let sig_dir = if ctx.cfg.check_permission_based_on_sig_owners {
            Some(ctx.cfg.sig_dir().context("compile sig_dir_pattern")?)
        } else {
            None
        };
        has_permission(&self.client, &ctx.pr, &ctx.info.base_ref, ctx.commenter, sig_dir.as_ref())
            .await
            .context("check permission")
    }

    /// Branch keepers alone decide for branches that have them.
    async fn can_approve(&self, ctx: &CommentContext<'_>) -> anyhow::Result<bool> {
        if let Some(source) = &ctx.cfg.branch_keeper {
            let cache = self
                .sig_cache
                .as_ref()
                .ok_or_else(|| anyhow!("branch keepers are configured but there is no SIG cache"))?;
            let keeper = check_branch_keeper(
                cache,
                source,
                ctx.pr.org(),
                ctx.pr.repo(),
                &ctx.info.base_ref,
                ctx.commenter,
            )
            .await
            .context("check branch keeper")?;
            match keeper {
                BranchKeeper::Keeper => return Ok(true),
                BranchKeeper::NotKeeper => return Ok(false),
                BranchKeeper::NotConfigured => {}
            }
        }
        self.can_write(ctx).await
    }

    // ─── Commands ───

    async fn add_lgtm(&self, ctx: &CommentContext<'_>) -> anyhow::Result<()> {
        if ctx.is_author() {
            return self.comment(&ctx.pr, MSG_LGTM_BY_SELF).await;
        }
        if !self.can_lgtm(ctx).await? {
            return self.comment(&ctx.pr, &msg_no_permission_for_lgtm(ctx.commenter)).await;
        }

        let label = gen_lgtm_label(ctx.commenter, ctx.cfg.lgtm_counts_required);
        if label != LGTM_LABEL {
            if let Err(e) = self.create_label_if_needed(ctx.repo, &label).await {
                warn!(label = %label, error = %e, "failed to create repository label");
            }
        }
        self.client
            .add_pr_label(&ctx.pr, &label)
            .await
            .with_context(|| format!("add label {label}"))?;
        self.confirm(ctx, &msg_label_added(&label, ctx.commenter)).await;

        self.try_merge(ctx.cfg, ctx.repo, ctx.info, Some(ctx.commenter), false).await
    }

    /// Reviewers withdraw their own LGTM; the author withdraws all of them.
    async fn remove_lgtm(&self, ctx: &CommentContext<'_>) -> anyhow::Result<()> {
        if ctx.is_author() {
            let mut errors = MultiError::new();
            for label in lgtm_labels(&LabelSet::new(&ctx.info.labels)) {
                errors.add_result(
                    self.client
                        .remove_pr_label(&ctx.pr, &label)
                        .await
                        .with_context(|| format!("remove label {label}")),
                );
            }
            return errors.into_result();
        }

        if !self.can_lgtm(ctx).await? {
            let body = msg_no_permission_for_label(ctx.commenter, "remove", LGTM_LABEL);
            return self.comment(&ctx.pr, &body).await;
        }
        let label = gen_lgtm_label(ctx.commenter, ctx.cfg.lgtm_counts_required);
        self.client
            .remove_pr_label(&ctx.pr, &label)
            .await
            .with_context(|| format!("remove label {label}"))?;
        self.comment(&ctx.pr, &msg_label_removed(&label, ctx.commenter)).await
    }

    async fn add_approve(&self, ctx: &CommentContext<'_>) -> anyhow::Result<()> {
        if !self.can_approve(ctx).await? {
            let body = msg_no_permission_for_label(ctx.commenter, "add", APPROVED_LABEL);
            return self.comment(&ctx.pr, &body).await;
        }
        self.client
            .add_pr_label(&ctx.pr, APPROVED_LABEL)
            .await
            .context("add label approved")?;
        self.confirm(ctx, &msg_label_added(APPROVED_LABEL, ctx.commenter)).await;

        self.try_merge(ctx.cfg, ctx.repo, ctx.info, Some(ctx.commenter), false).await
    }

    async fn remove_approve(&self, ctx: &CommentContext<'_>) -> anyhow::Result<()> {
        if !self.can_approve(ctx).await? {
            let body = msg_no_permission_for_label(ctx.commenter, "remove", APPROVED_LABEL);
            return self.comment(&ctx.pr, &body).await;
        }
        self.client
            .remove_pr_label(&ctx.pr, APPROVED_LABEL)
            .await
            .context("remove label approved")?;
        self.comment(&ctx.pr, &msg_label_removed(APPROVED_LABEL, ctx.commenter)).await
    }

    async fn remove_cla(&self, ctx: &CommentContext<'_>) -> anyhow::Result<()> {
        let label = &ctx.cfg.cla_label;
        if !self.can_write(ctx).await? {
            let body = format!(
                "**@{}** has no permission to remove ***{label}*** label in this pull request. \
                 :astonished:\nPlease contact to the collaborators in this repository.",
                ctx.commenter
            );
            return self.comment(&ctx.pr, &body).await;
        }
        self.client
            .remove_pr_label(&ctx.pr, label)
            .await
            .with_context(|| format!("remove label {label}"))
    }

    /// Adds `label` unless its counterpart is already on the PR.
    async fn add_merge_label(
        &self,
        ctx: &CommentContext<'_>,
        label: &str,
        counterpart: &str,
    ) -> anyhow::Result<()> {
        if !self.can_write(ctx).await? {
            return Ok(());
        }
        if LabelSet::new(&ctx.info.labels).contains(counterpart) {
            let cancel = format!("/{} cancel", command_name(counterpart));
            let command = format!("/{}", command_name(label));
            return self.comment(&ctx.pr, &msg_exclusive(counterpart, &cancel, &command)).await;
        }
        self.client
            .add_pr_label(&ctx.pr, label)
            .await
            .with_context(|| format!("add label {label}"))
    }

    async fn remove_merge_label(&self, ctx: &CommentContext<'_>, label: &str) -> anyhow::Result<()> {
        if !self.can_write(ctx).await? {
            return Ok(());
        }
        self.client
            .remove_pr_label(&ctx.pr, label)
            .await
            .with_context(|| format!("remove label {label}"))
    }

    async fn add_ack(&self, ctx: &CommentContext<'_>) -> anyhow::Result<()> {
        if !ctx.cfg.ack_enabled || !self.can_write(ctx).await? {
            return Ok(());
        }
        self.client
            .add_pr_label(&ctx.pr, ACK_LABEL)
            .await
            .context("add label Acked")
    }

    // ─── Merging ───

    /// Merges the PR if it is ready. With `add_comment`, a PR that is not
    /// ready gets the reasons; undecidable checks stay silent either way.
    async fn try_merge(
        &self,
        cfg: &ReviewConfig,
        repo: &RepoId,
        info: &PullRequestInfo,
        trigger: Option<&str>,
        add_comment: bool,
    ) -> anyhow::Result<()> {
        let mut helper = MergeHelper::new(&self.client, cfg, repo, info);
        if let Some(login) = trigger {
            helper = helper.triggered_by(login);
        }
        let pr = PrIssueRef::new(&repo.org, &repo.repo, info.number);

        let decision = match helper.can_merge().await {
            Ok(d) => d,
            Err(e) => {
                debug!(error = %format!("{e:#}"), "cannot decide mergeability");
                return Ok(());
            }
        };
        if !decision.is_mergeable() {
            if let (true, Some(login)) = (add_comment, trigger) {
                let body = format!(
                    "@{login}, this pr is not mergeable and the reasons are below:\n{}",
                    decision.reasons().join("\n")
                );
                return self.comment(&pr, &body).await;
            }
            debug!(reasons = ?decision.reasons(), "not mergeable");
            return Ok(());
        }

        let method = gen_merge_method(&self.client, &cfg.community, &pr, &info.labels).await;
        match helper.merge(method).await {
            Ok(()) => {
                info!(method = %method, "merged pull request");
                Ok(())
            }
            Err(e) if e.kind == ApiErrorKind::MergeConflict => {
                let body = format!(
                    "**@{}** This pull request can not be merged by {method}. :astonished:\n\
                     Please check the error message: {e}",
                    info.author
                );
                self.comment(&pr, &body).await
            }
            Err(e) => Err(e).context("merge pull request"),
        }
    }

    // ─── Pull request events ───

    /// Runs every PR flow, collecting their failures.
    #[instrument(skip_all, fields(repo = %event.repo, number = event.pull_request.number, action = ?event.action))]
    pub async fn handle_pull_request(
        &self,
        event: PullRequestEvent,
        config: &Configuration,
    ) -> anyhow::Result<()> {
        let cfg = repo_config(config, &event.repo)?;
        let pr = event.pr_ref();

        let mut errors = MultiError::new();
        errors.add_result(self.clear_review_labels(&event, &pr).await);
        errors.add_result(self.request_retest(&event, &pr).await);
        errors.add_result(self.check_reviewer(cfg, &event, &pr).await);
        if event.action == PrAction::UpdatedLabel {
            errors.add_result(
                self.try_merge(cfg, &event.repo, &event.pull_request, None, false)
                    .await,
            );
        }
        errors.into_result()
    }

    /// New commits invalidate earlier reviews.
    async fn clear_review_labels(&self, event: &PullRequestEvent, pr: &PrIssueRef) -> anyhow::Result<()> {
        if event.action != PrAction::Updated {
            return Ok(());
        }
        let labels = LabelSet::new(&event.pull_request.labels);
        let mut to_clear = lgtm_labels(&labels);
        if labels.contains(APPROVED_LABEL) {
            to_clear.extend(labels.origin(&[APPROVED_LABEL]));
        }
        if to_clear.is_empty() {
            return Ok(());
        }

        let mut errors = MultiError::new();
        for label in &to_clear {
            errors.add_result(
                self.client
                    .remove_pr_label(pr, label)
                    .await
                    .with_context(|| format!("remove label {label}")),
            );
        }
        let body = format!(
            "New code changes of pr are detected and remove these labels ***{}***. :flushed: ",
            to_clear.join(", ")
        );
        errors.add_result(self.comment(pr, &body).await);
        errors.into_result()
    }

    async fn request_retest(&self, event: &PullRequestEvent, pr: &PrIssueRef) -> anyhow::Result<()> {
        if event.action != PrAction::Updated {
            return Ok(());
        }
        self.comment(pr, RETEST_COMMAND).await
    }

    async fn check_reviewer(
        &self,
        cfg: &ReviewConfig,
        event: &PullRequestEvent,
        pr: &PrIssueRef,
    ) -> anyhow::Result<()> {
        if cfg.unable_checking_reviewer_for_pr
            || event.action != PrAction::Opened
            || !event.pull_request.assignees.is_empty()
        {
            return Ok(());
        }
        let body = format!(
            "**@{}** Thank you for submitting a PullRequest. It is detected that you have not set \
             a reviewer, please set a one.",
            event.sender
        );
        self.comment(pr, &body).await
    }

    // ─── Helpers ───

    async fn create_label_if_needed(&self, repo: &RepoId, label: &str) -> anyhow::Result<()> {
        let labels = self
            .client
            .get_repository_labels(repo)
            .await
            .context("list repository labels")?;
        if labels.iter().any(|l| l == label) {
            return Ok(());
        }
        self.client
            .create_repo_label(repo, label)
            .await
            .with_context(|| format!("create label {label}"))
    }

    async fn comment(&self, pr: &PrIssueRef, body: &str) -> anyhow::Result<()> {
        self.client
            .create_pr_comment(pr, body)
            .await
            .with_context(|| format!("comment on {pr}"))
    }

    /// Confirmation comments are best effort.
    async fn confirm(&self, ctx: &CommentContext<'_>, body: &str) {
        if let Err(e) = self.comment(&ctx.pr, body).await {
            warn!(error = %format!("{e:#}"), "failed to post confirmation");
        }
    }
}

/// `merge/rebase` -> `rebase`
fn command_name(merge_label: &str) -> &str {
    merge_label.rsplit('/').next().unwrap_or(merge_label)
}

fn repo_config<'a>(config: &'a Configuration, repo: &RepoId) -> anyhow::Result<&'a ReviewConfig> {
    config
        .config_for(&repo.org, &repo.repo)
        .ok_or_else(|| anyhow!("no config for this repo:{}/{}", repo.org, repo.repo))
}

impl<P: PlatformClient, S: SigInfoCache> Robot for ReviewBot<P, S> {
    type Config = Configuration;

    fn name(&self) -> &'static str {
        "review"
    }

    fn register(self: Arc<Self>, registry: &mut HandlerRegistry<Configuration>) -> Result<(), RegistryError> {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{MergeMethod, MergeOptions};
    use crate::config::parse_config;
    use crate::review::sig_info::SIG_INFO_FILE;
    use crate::test_utils::{Call, MockPlatformClient, MockSigCache, pr_event, pr_info, repo, review_comment};

    const BOT: &str = "ci-bot";

    const CONFIG: &str = r#"
config_items:
  - repos: [openeuler]
    legal_operator: ci-bot
"#;

    fn config(yaml: &str) -> Configuration {
        parse_config(yaml).unwrap()
    }

    fn bot(client: MockPlatformClient) -> ReviewBot<MockPlatformClient, MockSigCache> {
        ReviewBot::new(client, None)
    }

    fn added(label: &str, by: &str) -> String {
        msg_label_added(label, by)
    }

    fn merged(method: MergeMethod) -> Call {
        Call::Merge(MergeOptions {
            method,
            message: "\n".to_string(),
            sha: Some("def456".to_string()),
        })
    }

    // ─── /lgtm ───

    #[tokio::test]
    async fn author_cannot_lgtm_own_pr() {
        let bot = bot(MockPlatformClient::new().with_permission("alice", "write"));
        let event = review_comment("alice", "/lgtm", pr_info("alice", &[]));

        bot.handle_review_comment(event, &config(CONFIG)).await.unwrap();

        assert_eq!(bot.client.calls(), vec![Call::PrComment(MSG_LGTM_BY_SELF.to_string())]);
    }

    #[tokio::test]
    async fn reader_lgtm_is_thanked_but_not_applied() {
        let bot = bot(MockPlatformClient::new());
        let event = review_comment("bob", "/lgtm", pr_info("alice", &[]));

        bot.handle_review_comment(event, &config(CONFIG)).await.unwrap();

        assert_eq!(bot.client.calls(), vec![Call::PrComment(msg_no_permission_for_lgtm("bob"))]);
    }

    #[tokio::test]
    async fn writer_lgtm_adds_label_and_stays_quiet_when_not_ready() {
        let bot = bot(MockPlatformClient::new().with_permission("bob", "write"));
        let event = review_comment("bob", "/lgtm", pr_info("alice", &[]));

        bot.handle_review_comment(event, &config(CONFIG)).await.unwrap();

        assert_eq!(
            bot.client.calls(),
            vec![
                Call::AddPrLabel("lgtm".to_string()),
                Call::PrComment(added("lgtm", "bob")),
            ]
        );
    }

    #[tokio::test]
    async fn per_reviewer_lgtm_label_is_created_on_demand() {
        let yaml = "config_items:\n  - repos: [openeuler]\n    legal_operator: ci-bot\n    lgtm_counts_required: 2\n";
        let bot = bot(MockPlatformClient::new().with_permission("Bob", "write"));
        let event = review_comment("Bob", "/lgtm", pr_info("alice", &[]));

        bot.handle_review_comment(event, &config(yaml)).await.unwrap();

        assert_eq!(
            bot.client.calls()[..2],
            [
                Call::CreateRepoLabel("lgtm-bob".to_string()),
                Call::AddPrLabel("lgtm-bob".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn sig_owner_may_lgtm_when_enabled() {
        let yaml = "config_items:\n  - repos: [openeuler]\n    legal_operator: ci-bot\n    \
                    check_permission_based_on_sig_owners: true\n";
        let client = MockPlatformClient::new()
            .with_changes(&["sig/Kernel/OWNERS"])
            .with_file(&repo(), "master", "sig/Kernel/OWNERS", "maintainers: [bob]\n");
        let bot = bot(client);
        let event = review_comment("bob", "/lgtm", pr_info("alice", &[]));

        bot.handle_review_comment(event, &config(yaml)).await.unwrap();

        assert_eq!(bot.client.calls()[0], Call::AddPrLabel("lgtm".to_string()));
    }

    #[tokio::test]
    async fn author_lgtm_cancel_removes_every_lgtm_label() {
        let bot = bot(MockPlatformClient::new());
        let event = review_comment(
            "alice",
            "/lgtm cancel",
            pr_info("alice", &["lgtm-bob", "kind/bug", "LGTM-carol"]),
        );

        bot.handle_review_comment(event, &config(CONFIG)).await.unwrap();

        assert_eq!(
            bot.client.calls(),
            vec![
                Call::RemovePrLabel("lgtm-bob".to_string()),
                Call::RemovePrLabel("LGTM-carol".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn reviewer_lgtm_cancel_removes_own_label() {
        let bot = bot(MockPlatformClient::new().with_permission("bob", "write"));
        let event = review_comment("bob", "/lgtm cancel", pr_info("alice", &["lgtm"]));

        bot.handle_review_comment(event, &config(CONFIG)).await.unwrap();

        assert_eq!(
            bot.client.calls(),
            vec![
                Call::RemovePrLabel("lgtm".to_string()),
                Call::PrComment(msg_label_removed("lgtm", "bob")),
            ]
        );
    }

    // ─── /approve ───

    #[tokio::test]
    async fn approve_on_ready_pr_merges() {
        let client = MockPlatformClient::new()
            .with_permission("bob", "write")
            .with_pr_labels(&["lgtm"])
            .with_label_log("lgtm", BOT, 0)
            .with_label_log("approved", BOT, 1);
        let bot = bot(client);
        let event = review_comment("bob", "/approve", pr_info("alice", &["lgtm"]));

        bot.handle_review_comment(event, &config(CONFIG)).await.unwrap();

        assert_eq!(
            bot.client.calls(),
            vec![
                Call::AddPrLabel("approved".to_string()),
                Call::PrComment(added("approved", "bob")),
                merged(MergeMethod::Merge),
            ]
        );
    }

    #[tokio::test]
    async fn reader_cannot_approve() {
        let bot = bot(MockPlatformClient::new());
        let event = review_comment("bob", "/approve", pr_info("alice", &[]));

        bot.handle_review_comment(event, &config(CONFIG)).await.unwrap();

        assert_eq!(
            bot.client.calls(),
            vec![Call::PrComment(msg_no_permission_for_label("bob", "add", "approved"))]
        );
    }

    const KEEPER_CONFIG: &str = r#"
config_items:
  - repos: [openeuler]
    legal_operator: ci-bot
    branch_keeper:
      owner: openeuler
      repo: community
      branch: master
"#;

    const KEEPERS: &str = r#"
name: Kernel
branches:
  - repo_branch:
      - repo: openeuler/kernel
        branch: master
    keeper:
      - gitee_id: dave
"#;

    #[tokio::test]
    async fn branch_keepers_override_write_access() {
        let client = MockPlatformClient::new().with_permission("bob", "admin");
        let cache = MockSigCache::new().with_file(SIG_INFO_FILE, "sig/Kernel/sig-info.yaml", KEEPERS);
        let bot = ReviewBot::new(client, Some(cache));

        let event = review_comment("bob", "/approve", pr_info("alice", &[]));
        bot.handle_review_comment(event, &config(KEEPER_CONFIG)).await.unwrap();
        assert_eq!(
            bot.client.calls(),
            vec![Call::PrComment(msg_no_permission_for_label("bob", "add", "approved"))]
        );

        let event = review_comment("dave", "/approve cancel", pr_info("alice", &["approved"]));
        bot.handle_review_comment(event, &config(KEEPER_CONFIG)).await.unwrap();
        assert_eq!(
            bot.client.calls()[1..],
            [
                Call::RemovePrLabel("approved".to_string()),
                Call::PrComment(msg_label_removed("approved", "dave")),
            ]
        );
    }

    #[tokio::test]
    async fn branch_keepers_without_cache_is_an_error() {
        let bot = bot(MockPlatformClient::new().with_permission("bob", "write"));
        let event = review_comment("bob", "/approve", pr_info("alice", &[]));

        assert!(bot.handle_review_comment(event, &config(KEEPER_CONFIG)).await.is_err());
        assert!(bot.client.calls().is_empty());
    }

    // ─── /check-pr ───

    #[tokio::test]
    async fn check_pr_lists_reasons() {
        let bot = bot(MockPlatformClient::new().with_pr_labels(&["lgtm"]).with_label_log("lgtm", BOT, 0));
        let event = review_comment("bob", "/check-pr", pr_info("alice", &["lgtm"]));

        bot.handle_review_comment(event, &config(CONFIG)).await.unwrap();

        assert_eq!(
            bot.client.posted_comments(),
            vec!["@bob, this pr is not mergeable and the reasons are below:\n\
                  PR does not have these labels: ***approved***"]
        );
    }

    #[tokio::test]
    async fn check_pr_on_frozen_branch_names_owners() {
        let yaml = "config_items:\n  - repos: [openeuler]\n    legal_operator: ci-bot\n    freeze_file:\n      \
                    - owner: openeuler\n        repo: release\n        branch: main\n        path: freeze.yaml\n";
        let freeze = "release:\n  - community: openeuler\n    branch: master\n    frozen: true\n    owner: [rm, qa]\n";
        let client = MockPlatformClient::new()
            .with_pr_labels(&["lgtm", "approved"])
            .with_label_log("lgtm", BOT, 0)
            .with_label_log("approved", BOT, 0)
            .with_file(&RepoId::new("openeuler", "release"), "main", "freeze.yaml", freeze);
        let bot = bot(client);
        let event = review_comment("bob", "/check-pr", pr_info("alice", &["lgtm", "approved"]));

        bot.handle_review_comment(event, &config(yaml)).await.unwrap();

        assert_eq!(
            bot.client.posted_comments(),
            vec!["@bob, this pr is not mergeable and the reasons are below:\n\
                  The target branch of PR has been frozen and it can be merge only by branch owners: @rm , @qa"]
        );
        assert!(bot.client.merges().is_empty());
    }

    #[tokio::test]
    async fn undecidable_check_is_silent() {
        let bot = bot(MockPlatformClient::new().failing_operation_logs());
        let event = review_comment("bob", "/check-pr", pr_info("alice", &["lgtm", "approved"]));

        bot.handle_review_comment(event, &config(CONFIG)).await.unwrap();

        assert!(bot.client.calls().is_empty());
    }

    #[tokio::test]
    async fn merge_conflict_is_reported() {
        let client = MockPlatformClient::new()
            .with_pr_labels(&["lgtm", "approved", "merge/rebase"])
            .with_label_log("lgtm", BOT, 0)
            .with_label_log("approved", BOT, 0)
            .with_merge_conflict();
        let bot = bot(client);
        let event = review_comment("bob", "/check-pr", pr_info("alice", &["lgtm", "approved", "merge/rebase"]));

        bot.handle_review_comment(event, &config(CONFIG)).await.unwrap();

        let comments = bot.client.posted_comments();
        assert_eq!(comments.len(), 1);
        assert!(comments[0].starts_with("**@alice** This pull request can not be merged by rebase."));
        assert!(comments[0].contains("conflicting files"));
    }

    // ─── /rebase, /squash, /cla cancel, /ack ───

    #[tokio::test]
    async fn rebase_refused_while_squash_label_present() {
        let bot = bot(MockPlatformClient::new().with_permission("bob", "write"));
        let event = review_comment("bob", "/rebase", pr_info("alice", &["Merge/Squash"]));

        bot.handle_review_comment(event, &config(CONFIG)).await.unwrap();

        assert_eq!(
            bot.client.calls(),
            vec![Call::PrComment(
                "Please use **/squash cancel** to remove **merge/squash** label, and try **/rebase** again"
                    .to_string()
            )]
        );
    }

    #[tokio::test]
    async fn squash_and_cancel_toggle_the_label() {
        let bot = bot(MockPlatformClient::new().with_permission("bob", "write"));

        let event = review_comment("bob", "/squash", pr_info("alice", &[]));
        bot.handle_review_comment(event, &config(CONFIG)).await.unwrap();
        let event = review_comment("bob", "/squash cancel", pr_info("alice", &["merge/squash"]));
        bot.handle_review_comment(event, &config(CONFIG)).await.unwrap();

        assert_eq!(
            bot.client.calls(),
            vec![
                Call::AddPrLabel("merge/squash".to_string()),
                Call::RemovePrLabel("merge/squash".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn readers_merge_method_commands_are_ignored() {
        let bot = bot(MockPlatformClient::new());
        let event = review_comment("bob", "/rebase", pr_info("alice", &[]));

        bot.handle_review_comment(event, &config(CONFIG)).await.unwrap();

        assert!(bot.client.calls().is_empty());
    }

    #[tokio::test]
    async fn cla_cancel_needs_write_access() {
        let bot = bot(MockPlatformClient::new().with_permission("root", "admin"));

        let event = review_comment("bob", "/cla cancel", pr_info("alice", &["openeuler-cla/yes"]));
        bot.handle_review_comment(event, &config(CONFIG)).await.unwrap();
        let event = review_comment("root", "/cla cancel", pr_info("alice", &["openeuler-cla/yes"]));
        bot.handle_review_comment(event, &config(CONFIG)).await.unwrap();

        let calls = bot.client.calls();
        assert!(matches!(&calls[0], Call::PrComment(body) if body.starts_with("**@bob** has no permission")));
        assert_eq!(calls[1], Call::RemovePrLabel("openeuler-cla/yes".to_string()));
    }

    #[tokio::test]
    async fn ack_requires_opt_in() {
        let enabled = "config_items:\n  - repos: [openeuler]\n    legal_operator: ci-bot\n    ack_enabled: true\n";
        let bot = bot(MockPlatformClient::new().with_permission("bob", "write"));

        let event = review_comment("bob", "/ack", pr_info("alice", &[]));
        bot.handle_review_comment(event, &config(CONFIG)).await.unwrap();
        assert!(bot.client.calls().is_empty());

        let event = review_comment("bob", "/ack", pr_info("alice", &[]));
        bot.handle_review_comment(event, &config(enabled)).await.unwrap();
        assert_eq!(bot.client.calls(), vec![Call::AddPrLabel("Acked".to_string())]);
    }

    // ─── Comment filtering ───

    #[tokio::test]
    async fn closed_pr_is_ignored() {
        let bot = bot(MockPlatformClient::new().with_permission("bob", "write"));
        let mut info = pr_info("alice", &[]);
        info.state = "closed".to_string();
        let event = review_comment("bob", "/lgtm", info);

        bot.handle_review_comment(event, &config(CONFIG)).await.unwrap();

        assert!(bot.client.calls().is_empty());
    }

    #[tokio::test]
    async fn command_in_unconfigured_repo_is_an_error() {
        let bot = bot(MockPlatformClient::new());
        let yaml = "config_items:\n  - repos: [src-openeuler]\n    legal_operator: ci-bot\n";
        let event = review_comment("bob", "/lgtm", pr_info("alice", &[]));

        let err = bot.handle_review_comment(event, &config(yaml)).await.unwrap_err();
        assert!(err.to_string().contains("no config for this repo:openeuler/kernel"));
    }

    #[tokio::test]
    async fn plain_comment_needs_no_config() {
        let bot = bot(MockPlatformClient::new());
        let event = review_comment("bob", "looks good to me", pr_info("alice", &[]));

        bot.handle_review_comment(event, &config("config_items: []\n")).await.unwrap();

        assert!(bot.client.calls().is_empty());
    }

    // ─── Pull request events ───

    #[tokio::test]
    async fn new_commits_clear_review_labels_and_retest() {
        let bot = bot(MockPlatformClient::new());
        let event = pr_event(PrAction::Updated, pr_info("alice", &["lgtm-bob", "approved", "kind/bug"]));

        bot.handle_pull_request(event, &config(CONFIG)).await.unwrap();

        assert_eq!(
            bot.client.calls(),
            vec![
                Call::RemovePrLabel("lgtm-bob".to_string()),
                Call::RemovePrLabel("approved".to_string()),
                Call::PrComment(
                    "New code changes of pr are detected and remove these labels \
                     ***lgtm-bob, approved***. :flushed: "
                        .to_string()
                ),
                Call::PrComment("/retest".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn opened_without_assignees_asks_for_reviewer() {
        let bot = bot(MockPlatformClient::new());
        let event = pr_event(PrAction::Opened, pr_info("alice", &[]));

        bot.handle_pull_request(event, &config(CONFIG)).await.unwrap();

        assert_eq!(
            bot.client.posted_comments(),
            vec!["**@alice** Thank you for submitting a PullRequest. It is detected that you have \
                  not set a reviewer, please set a one."]
        );
    }

    #[tokio::test]
    async fn reviewer_check_can_be_disabled() {
        let yaml = "config_items:\n  - repos: [openeuler]\n    legal_operator: ci-bot\n    \
                    unable_checking_reviewer_for_pr: true\n";
        let bot = bot(MockPlatformClient::new());

        bot.handle_pull_request(pr_event(PrAction::Opened, pr_info("alice", &[])), &config(yaml))
            .await
            .unwrap();

        assert!(bot.client.calls().is_empty());
    }

    #[tokio::test]
    async fn label_update_merges_ready_pr_silently() {
        let client = MockPlatformClient::new()
            .with_label_log("lgtm", BOT, 0)
            .with_label_log("approved", BOT, 0);
        let bot = bot(client);
        let ready = pr_event(PrAction::UpdatedLabel, pr_info("alice", &["lgtm", "approved", "merge/squash"]));
        let not_ready = pr_event(PrAction::UpdatedLabel, pr_info("alice", &["lgtm"]));

        bot.handle_pull_request(not_ready, &config(CONFIG)).await.unwrap();
        bot.handle_pull_request(ready, &config(CONFIG)).await.unwrap();

        assert_eq!(
            bot.client.calls(),
            vec![Call::Merge(MergeOptions {
                method: MergeMethod::Squash,
                message: "\n".to_string(),
                sha: Some("def456".to_string()),
            })]
        );
    }

    #[tokio::test]
    async fn pr_event_in_unconfigured_repo_is_an_error() {
        let bot = bot(MockPlatformClient::new());
        let event = pr_event(PrAction::Updated, pr_info("alice", &["lgtm"]));
        let yaml = "config_items:\n  - repos: [other]\n    legal_operator: ci-bot\n";

        assert!(bot.handle_pull_request(event, &config(yaml)).await.is_err());
        assert!(bot.client.calls().is_empty());
    }
}
