//! Typed AtomGit webhook events.
//!
//! A delivery is decoded into exactly one [`EventEnvelope`] variant, keyed on the
//! `X-AtomGit-Event` header. Only the fields the bots act on are kept.

use std::fmt;

use axum::body::Bytes;

use crate::types::{PrIssueRef, RepoId};

/// Category of a webhook event. Each category has at most one registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Issue,
    IssueComment,
    PullRequest,
    Push,
    Review,
    ReviewComment,
    /// A delivery that arrived through the relay and is addressed to the access bot.
    Access,
}

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        EventKind::Issue,
        EventKind::IssueComment,
        EventKind::PullRequest,
        EventKind::Push,
        EventKind::Review,
        EventKind::ReviewComment,
        EventKind::Access,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Issue => "issue",
            EventKind::IssueComment => "issue_comment",
            EventKind::PullRequest => "pull_request",
            EventKind::Push => "push",
            EventKind::Review => "review",
            EventKind::ReviewComment => "review_comment",
            EventKind::Access => "access",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed webhook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventEnvelope {
    Issue(IssueEvent),
    IssueComment(IssueCommentEvent),
    PullRequest(PullRequestEvent),
    Push(PushEvent),
    Review(ReviewEvent),
    ReviewComment(ReviewCommentEvent),
    Access(AccessEvent),
}

impl EventEnvelope {
    pub fn kind(&self) -> EventKind {
        match self {
            EventEnvelope::Issue(_) => EventKind::Issue,
            EventEnvelope::IssueComment(_) => EventKind::IssueComment,
            EventEnvelope::PullRequest(_) => EventKind::PullRequest,
            EventEnvelope::Push(_) => EventKind::Push,
            EventEnvelope::Review(_) => EventKind::Review,
            EventEnvelope::ReviewComment(_) => EventKind::ReviewComment,
            EventEnvelope::Access(_) => EventKind::Access,
        }
    }

    /// Returns the repository the event belongs to, when the payload names one.
    pub fn repo_id(&self) -> Option<&RepoId> {
        match self {
            EventEnvelope::Issue(e) => Some(&e.repo),
            EventEnvelope::IssueComment(e) => Some(&e.repo),
            EventEnvelope::PullRequest(e) => Some(&e.repo),
            EventEnvelope::Push(e) => Some(&e.repo),
            EventEnvelope::Review(e) => Some(&e.repo),
            EventEnvelope::ReviewComment(e) => Some(&e.repo),
            EventEnvelope::Access(e) => e.repo.as_ref(),
        }
    }
}

/// Action performed on a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PrAction {
    Opened,
    /// New commits were pushed to the source branch.
    Updated,
    /// The label set of the PR changed.
    UpdatedLabel,
    Closed,
    Merged,
    Reopened,
    Other(String),
}

impl PrAction {
    pub fn from_wire(action: &str) -> Self {
        match action {
            "opened" | "open" => PrAction::Opened,
            "updated" | "update" | "synchronize" | "synchronized" => PrAction::Updated,
            "updated_label" => PrAction::UpdatedLabel,
            "closed" | "close" => PrAction::Closed,
            "merged" | "merge" => PrAction::Merged,
            "reopened" | "reopen" => PrAction::Reopened,
            other => PrAction::Other(other.to_string()),
        }
    }
}

/// Action performed on a comment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommentAction {
    Created,
    Edited,
    Deleted,
    Other(String),
}

impl CommentAction {
    /// AtomGit reports new review comments as `opened`, issue comments as `created`.
    pub fn from_wire(action: &str) -> Self {
        match action {
            "created" | "opened" | "comment" => CommentAction::Created,
            "edited" | "updated" => CommentAction::Edited,
            "deleted" => CommentAction::Deleted,
            other => CommentAction::Other(other.to_string()),
        }
    }
}

/// The pull request object embedded in PR, review, and review-comment events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestInfo {
    pub number: u64,
    pub title: String,
    /// `open`, `closed` or `merged`.
    pub state: String,
    pub html_url: String,
    pub author: String,
    pub labels: Vec<String>,
    pub base_ref: String,
    pub head_ref: String,
    pub head_sha: String,
    /// `None` while the platform is still computing mergeability.
    pub mergeable: Option<bool>,
    pub merge_commit_sha: Option<String>,
    pub assignees: Vec<String>,
    pub requested_reviewers: Vec<String>,
}

impl PullRequestInfo {
    pub fn is_open(&self) -> bool {
        self.state == "open" || self.state == "opened"
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// The issue object embedded in issue and issue-comment events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueInfo {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub html_url: String,
    pub author: String,
    pub labels: Vec<String>,
    /// Set when the issue is actually a pull request.
    pub is_pull_request: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentInfo {
    pub id: String,
    pub body: String,
    pub author: String,
    /// Commit the comment is attached to (review comments only).
    pub commit_id: Option<String>,
    pub html_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewInfo {
    pub id: String,
    pub state: String,
    pub body: String,
    pub author: String,
    pub html_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueEvent {
    pub repo: RepoId,
    pub action: String,
    pub issue: IssueInfo,
    pub sender: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueCommentEvent {
    pub repo: RepoId,
    pub action: CommentAction,
    pub issue: IssueInfo,
    pub comment: CommentInfo,
}

impl IssueCommentEvent {
    pub fn issue_ref(&self) -> PrIssueRef {
        PrIssueRef::new(&self.repo.org, &self.repo.repo, self.issue.number)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestEvent {
    pub repo: RepoId,
    pub action: PrAction,
    pub pull_request: PullRequestInfo,
    pub sender: String,
}

impl PullRequestEvent {
    pub fn pr_ref(&self) -> PrIssueRef {
        PrIssueRef::new(&self.repo.org, &self.repo.repo, self.pull_request.number)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushEvent {
    pub repo: RepoId,
    pub git_ref: String,
    pub before: String,
    pub after: String,
    pub pusher: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewEvent {
    pub repo: RepoId,
    pub action: String,
    pub pull_request: PullRequestInfo,
    pub review: ReviewInfo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewCommentEvent {
    pub repo: RepoId,
    pub action: CommentAction,
    pub pull_request: PullRequestInfo,
    pub comment: CommentInfo,
}

impl ReviewCommentEvent {
    pub fn pr_ref(&self) -> PrIssueRef {
        PrIssueRef::new(&self.repo.org, &self.repo.repo, self.pull_request.number)
    }
}

/// A relay delivery addressed to the access bot.
///
/// The payload is kept verbatim so it can be forwarded downstream unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessEvent {
    /// The original event type, with the relay prefix stripped.
    pub event_type: String,
    pub repo: Option<RepoId>,
    pub payload: Bytes,
}
