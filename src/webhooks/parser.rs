//! AtomGit webhook payload parser.
//!
//! Raw webhook JSON is decoded into typed [`EventEnvelope`] values.
//!
//! # Parsing Strategy
//!
//! 1. The event type is taken from the `X-AtomGit-Event` header
//! 2. Types carrying the relay prefix become [`AccessEvent`]s with the payload kept verbatim
//! 3. Other known types are decoded into their typed event
//! 4. Unknown event types return `Ok(None)` (ignored, not error)
//! 5. Malformed payloads return `Err` with details

use axum::body::Bytes;
use serde::Deserialize;
use thiserror::Error;

use crate::types::RepoId;

use super::events::{
    AccessEvent, CommentAction, CommentInfo, EventEnvelope, IssueCommentEvent, IssueEvent,
    IssueInfo, PrAction, PullRequestEvent, PullRequestInfo, PushEvent, ReviewCommentEvent,
    ReviewEvent, ReviewInfo,
};

/// Prefix the ingress puts on relayed event types that are meant for the access bot.
pub const RELAY_EVENT_PREFIX: &str = "to_access_";

/// Error type for webhook parsing failures.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON deserialization failed (includes missing required fields).
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Field has invalid value.
    #[error("invalid field value for {field}: {value}")]
    InvalidField { field: &'static str, value: String },
}

/// Parses a webhook payload into a typed event.
///
/// * `Ok(Some(event))` - a known event type
/// * `Ok(None)` - unknown event type (ignored, not an error)
/// * `Err(e)` - malformed payload or missing required fields
///
/// ```
/// use community_robot::webhooks::{parse_webhook, EventEnvelope};
///
/// let payload = br#"{
///     "action": "created",
///     "comment": { "id": 123, "body": "/kind bug", "user": { "login": "alice" } },
///     "issue": { "number": 42, "user": { "login": "bob" } },
///     "repository": { "owner": { "login": "openeuler" }, "name": "kernel" }
/// }"#;
///
/// let event = parse_webhook("issue_comment", payload).unwrap();
/// assert!(matches!(event, Some(EventEnvelope::IssueComment(_))));
/// ```
pub fn parse_webhook(event_type: &str, payload: &[u8]) -> Result<Option<EventEnvelope>, ParseError> {
    if let Some(inner) = event_type.strip_prefix(RELAY_EVENT_PREFIX) {
        return parse_access(inner, payload).map(|e| Some(EventEnvelope::Access(e)));
    }

    match event_type {
        "issues" | "issue" => parse_issue(payload).map(|e| Some(EventEnvelope::Issue(e))),
        "issue_comment" | "note" => {
            parse_issue_comment(payload).map(|e| Some(EventEnvelope::IssueComment(e)))
        }
        "pull_request" | "merge_request" => {
            parse_pull_request(payload).map(|e| Some(EventEnvelope::PullRequest(e)))
        }
        "push" => parse_push(payload).map(|e| Some(EventEnvelope::Push(e))),
        "pull_request_review" => parse_review(payload).map(|e| Some(EventEnvelope::Review(e))),
        "pull_request_review_comment" => {
            parse_review_comment(payload).map(|e| Some(EventEnvelope::ReviewComment(e)))
        }
        _ => Ok(None),
    }
}

// ============================================================================
// Raw payload structures for deserialization
//
// Optional fields default to empty values; only identifiers are required.
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawRepository {
    owner: Option<RawUser>,
    name: Option<String>,
    full_name: Option<String>,
}

impl RawRepository {
    /// Prefers `owner.login` + `name`, falling back to splitting `full_name`.
    fn into_repo_id(self) -> Result<RepoId, ParseError> {
        if let (Some(owner), Some(name)) = (&self.owner, &self.name)
            && !owner.login.is_empty()
            && !name.is_empty()
        {
            return Ok(RepoId::new(&owner.login, name));
        }

        let full_name = self.full_name.unwrap_or_default();
        match full_name.split_once('/') {
            Some((org, repo)) if !org.is_empty() && !repo.is_empty() => Ok(RepoId::new(org, repo)),
            _ => Err(ParseError::InvalidField {
                field: "repository",
                value: full_name,
            }),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawUser {
    #[serde(default)]
    login: String,
}

#[derive(Debug, Deserialize)]
struct RawLabel {
    name: String,
}

/// Comment and review ids arrive as numbers or strings depending on the event.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Number(n) => n.to_string(),
            RawId::Text(s) => s,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawRef {
    #[serde(rename = "ref", default)]
    ref_name: String,
    #[serde(default)]
    sha: String,
}

#[derive(Debug, Deserialize)]
struct RawPullRequest {
    number: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    html_url: String,
    #[serde(default)]
    user: RawUser,
    #[serde(default)]
    labels: Vec<RawLabel>,
    base: RawRef,
    head: RawRef,
    mergeable: Option<bool>,
    merge_commit_sha: Option<String>,
    #[serde(default)]
    assignees: Vec<RawUser>,
    #[serde(default)]
    requested_reviewers: Vec<RawUser>,
}

impl From<RawPullRequest> for PullRequestInfo {
    fn from(raw: RawPullRequest) -> Self {
        PullRequestInfo {
            number: raw.number,
            title: raw.title,
            state: raw.state,
            html_url: raw.html_url,
            author: raw.user.login,
            labels: raw.labels.into_iter().map(|l| l.name).collect(),
            base_ref: raw.base.ref_name,
            head_ref: raw.head.ref_name,
            head_sha: raw.head.sha,
            mergeable: raw.mergeable,
            merge_commit_sha: raw.merge_commit_sha.filter(|s| !s.is_empty()),
            assignees: raw.assignees.into_iter().map(|u| u.login).collect(),
            requested_reviewers: raw.requested_reviewers.into_iter().map(|u| u.login).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    number: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    html_url: String,
    #[serde(default)]
    user: RawUser,
    #[serde(default)]
    labels: Vec<RawLabel>,
    // If this field is present, the issue is actually a PR
    pull_request: Option<serde_json::Value>,
}

impl From<RawIssue> for IssueInfo {
    fn from(raw: RawIssue) -> Self {
        IssueInfo {
            number: raw.number,
            title: raw.title,
            state: raw.state,
            html_url: raw.html_url,
            author: raw.user.login,
            labels: raw.labels.into_iter().map(|l| l.name).collect(),
            is_pull_request: raw.pull_request.is_some_and(|v| !v.is_null()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawComment {
    id: RawId,
    body: Option<String>,
    #[serde(default)]
    user: RawUser,
    commit_id: Option<String>,
    #[serde(default)]
    html_url: String,
}

impl From<RawComment> for CommentInfo {
    fn from(raw: RawComment) -> Self {
        CommentInfo {
            id: raw.id.into_string(),
            body: raw.body.unwrap_or_default(),
            author: raw.user.login,
            commit_id: raw.commit_id.filter(|s| !s.is_empty()),
            html_url: raw.html_url,
        }
    }
}

// ============================================================================
// issues event
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawIssuePayload {
    #[serde(default)]
    action: String,
    issue: RawIssue,
    repository: RawRepository,
    #[serde(default)]
    sender: RawUser,
}

fn parse_issue(payload: &[u8]) -> Result<IssueEvent, ParseError> {
    let raw: RawIssuePayload = serde_json::from_slice(payload)?;

    Ok(IssueEvent {
        repo: raw.repository.into_repo_id()?,
        action: raw.action,
        issue: raw.issue.into(),
        sender: raw.sender.login,
    })
}

// ============================================================================
// issue_comment event
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawIssueCommentPayload {
    #[serde(default)]
    action: String,
    comment: RawComment,
    issue: RawIssue,
    repository: RawRepository,
}

fn parse_issue_comment(payload: &[u8]) -> Result<IssueCommentEvent, ParseError> {
    let raw: RawIssueCommentPayload = serde_json::from_slice(payload)?;

    Ok(IssueCommentEvent {
        repo: raw.repository.into_repo_id()?,
        action: CommentAction::from_wire(&raw.action),
        issue: raw.issue.into(),
        comment: raw.comment.into(),
    })
}

// ============================================================================
// pull_request event
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawPullRequestPayload {
    #[serde(default)]
    action: String,
    pull_request: RawPullRequest,
    repository: RawRepository,
    #[serde(default)]
    sender: RawUser,
}

fn parse_pull_request(payload: &[u8]) -> Result<PullRequestEvent, ParseError> {
    let raw: RawPullRequestPayload = serde_json::from_slice(payload)?;

    if raw.action.is_empty() {
        return Err(ParseError::InvalidField {
            field: "action",
            value: String::new(),
        });
    }

    Ok(PullRequestEvent {
        repo: raw.repository.into_repo_id()?,
        action: PrAction::from_wire(&raw.action),
        pull_request: raw.pull_request.into(),
        sender: raw.sender.login,
    })
}

// ============================================================================
// push event
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawPushPayload {
    #[serde(rename = "ref", default)]
    git_ref: String,
    #[serde(default)]
    before: String,
    #[serde(default)]
    after: String,
    repository: RawRepository,
    pusher: Option<RawPusher>,
}

/// Pushers carry `name` on some deliveries and `login` on others.
#[derive(Debug, Deserialize)]
struct RawPusher {
    name: Option<String>,
    login: Option<String>,
}

fn parse_push(payload: &[u8]) -> Result<PushEvent, ParseError> {
    let raw: RawPushPayload = serde_json::from_slice(payload)?;

    Ok(PushEvent {
        repo: raw.repository.into_repo_id()?,
        git_ref: raw.git_ref,
        before: raw.before,
        after: raw.after,
        pusher: raw
            .pusher
            .and_then(|p| p.login.or(p.name))
            .unwrap_or_default(),
    })
}

// ============================================================================
// pull_request_review event
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawReviewPayload {
    #[serde(default)]
    action: String,
    review: RawReview,
    pull_request: RawPullRequest,
    repository: RawRepository,
}

#[derive(Debug, Deserialize)]
struct RawReview {
    id: RawId,
    #[serde(default)]
    state: String,
    body: Option<String>,
    #[serde(default)]
    user: RawUser,
    #[serde(default)]
    html_url: String,
}

fn parse_review(payload: &[u8]) -> Result<ReviewEvent, ParseError> {
    let raw: RawReviewPayload = serde_json::from_slice(payload)?;

    Ok(ReviewEvent {
        repo: raw.repository.into_repo_id()?,
        action: raw.action,
        pull_request: raw.pull_request.into(),
        review: ReviewInfo {
            id: raw.review.id.into_string(),
            state: raw.review.state.to_lowercase(),
            body: raw.review.body.unwrap_or_default(),
            author: raw.review.user.login,
            html_url: raw.review.html_url,
        },
    })
}

// ============================================================================
// pull_request_review_comment event
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawReviewCommentPayload {
    #[serde(default)]
    action: String,
    comment: RawComment,
    pull_request: RawPullRequest,
    repository: RawRepository,
}

fn parse_review_comment(payload: &[u8]) -> Result<ReviewCommentEvent, ParseError> {
    let raw: RawReviewCommentPayload = serde_json::from_slice(payload)?;

    Ok(ReviewCommentEvent {
        repo: raw.repository.into_repo_id()?,
        action: CommentAction::from_wire(&raw.action),
        pull_request: raw.pull_request.into(),
        comment: raw.comment.into(),
    })
}

// ============================================================================
// relayed events
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawAccessPayload {
    repository: Option<RawRepository>,
}

/// Relay payloads are forwarded untouched; the repository is extracted only
/// for routing and may be absent.
fn parse_access(inner_type: &str, payload: &[u8]) -> Result<AccessEvent, ParseError> {
    if inner_type.is_empty() {
        return Err(ParseError::InvalidField {
            field: "X-AtomGit-Event",
            value: RELAY_EVENT_PREFIX.to_string(),
        });
    }

    let raw: RawAccessPayload = serde_json::from_slice(payload)?;
    let repo = raw.repository.and_then(|r| r.into_repo_id().ok());

    Ok(AccessEvent {
        event_type: inner_type.to_string(),
        repo,
        payload: Bytes::copy_from_slice(payload),
    })
}
