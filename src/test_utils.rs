//! Shared test utilities: in-memory platform and SIG cache doubles, event
//! builders, and a throwaway HTTP server.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::client::{
    ApiError, ApiErrorKind, ChangedFile, LogSubject, MergeOptions, OperationKind, OperationLogEntry,
    PathContent, PlatformClient, PrComment, SigCacheError, SigFile, SigInfoCache, UserPermission,
};
use crate::types::{PrIssueRef, RepoId};
use crate::webhooks::{
    CommentAction, CommentInfo, PrAction, PullRequestEvent, PullRequestInfo, ReviewCommentEvent,
};

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn spawn_test_server(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

pub fn ts(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
}

pub fn encode(text: &str) -> String {
    STANDARD.encode(text)
}

// ─── Platform double ─────────────────────────────────────────────────────────

/// A mutating call made against [`MockPlatformClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateRepoLabel(String),
    AddPrLabel(String),
    RemovePrLabel(String),
    AddIssueLabels(Vec<String>),
    RemoveIssueLabel(String),
    PrComment(String),
    PrCommentReply { body: String, comment_id: String },
    IssueComment(String),
    Merge(MergeOptions),
    Assign(Vec<String>),
}

#[derive(Debug, Default)]
struct MockState {
    repo_labels: Vec<String>,
    pr_labels: Vec<String>,
    comments: Vec<PrComment>,
    changes: Vec<ChangedFile>,
    files: HashMap<(String, String, String), String>,
    operation_logs: Vec<OperationLogEntry>,
    permissions: HashMap<String, String>,
    collaborators: HashSet<String>,
    fail_operation_logs: bool,
    merge_conflict: bool,
    fail_label_adds: HashSet<String>,
    fail_comments: bool,
    calls: Vec<Call>,
}

/// In-memory [`PlatformClient`] that records every mutating call.
///
/// Labels added to or removed from the PR are reflected in later reads.
#[derive(Debug, Default)]
pub struct MockPlatformClient {
    state: Mutex<MockState>,
}

impl MockPlatformClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state(self, f: impl FnOnce(&mut MockState)) -> Self {
        f(&mut self.state.lock().unwrap());
        self
    }

    pub fn with_repo_labels(self, labels: &[&str]) -> Self {
        self.with_state(|s| s.repo_labels = labels.iter().map(|l| l.to_string()).collect())
    }

    pub fn with_pr_labels(self, labels: &[&str]) -> Self {
        self.with_state(|s| s.pr_labels = labels.iter().map(|l| l.to_string()).collect())
    }

    pub fn with_permission(self, login: &str, permission: &str) -> Self {
        self.with_state(|s| {
            s.permissions
                .insert(login.to_string(), permission.to_string());
        })
    }

    pub fn with_collaborator(self, login: &str) -> Self {
        self.with_state(|s| {
            s.collaborators.insert(login.to_string());
        })
    }

    /// Stores a plain-text file; reads return it base64-encoded.
    pub fn with_file(self, repo: &RepoId, branch: &str, path: &str, text: &str) -> Self {
        self.with_state(|s| {
            s.files.insert(
                (repo.to_string(), branch.to_string(), path.to_string()),
                encode(text),
            );
        })
    }

    pub fn with_changes(self, files: &[&str]) -> Self {
        self.with_state(|s| {
            s.changes = files
                .iter()
                .map(|f| ChangedFile {
                    filename: f.to_string(),
                    status: "modified".to_string(),
                })
                .collect();
        })
    }

    pub fn with_comment(self, author: &str, body: &str, created: i64, updated: i64) -> Self {
        self.with_state(|s| {
            let id = s.comments.len().to_string();
            s.comments.push(PrComment {
                id,
                body: body.to_string(),
                author: author.to_string(),
                created_at: ts(created),
                updated_at: ts(updated),
            });
        })
    }

    /// Records that `actor` added `label` at minute `at`.
    pub fn with_label_log(self, label: &str, actor: &str, at: i64) -> Self {
        self.with_state(|s| {
            s.operation_logs.push(OperationLogEntry {
                kind: OperationKind::LabelAdded,
                subject: LogSubject::Label(label.to_string()),
                actor: Some(actor.to_string()),
                created_at: ts(at),
            });
        })
    }

    pub fn failing_operation_logs(self) -> Self {
        self.with_state(|s| s.fail_operation_logs = true)
    }

    pub fn with_merge_conflict(self) -> Self {
        self.with_state(|s| s.merge_conflict = true)
    }

    pub fn failing_label_add(self, label: &str) -> Self {
        self.with_state(|s| {
            s.fail_label_adds.insert(label.to_string());
        })
    }

    /// Every comment is recorded and then rejected.
    pub fn failing_comments(self) -> Self {
        self.with_state(|s| s.fail_comments = true)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Bodies of every PR and issue comment posted, in order.
    pub fn posted_comments(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::PrComment(b) | Call::IssueComment(b) => Some(b),
                Call::PrCommentReply { body, .. } => Some(body),
                _ => None,
            })
            .collect()
    }

    pub fn merges(&self) -> Vec<MergeOptions> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Merge(o) => Some(o),
                _ => None,
            })
            .collect()
    }

    pub fn pr_labels(&self) -> Vec<String> {
        self.state.lock().unwrap().pr_labels.clone()
    }

    pub fn repo_labels(&self) -> Vec<String> {
        self.state.lock().unwrap().repo_labels.clone()
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn record_comment(&self, call: Call) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if state.fail_comments {
            return Err(ApiError::from_status(500, "cannot comment"));
        }
        Ok(())
    }
}

impl PlatformClient for MockPlatformClient {
    async fn get_repository_labels(&self, _repo: &RepoId) -> Result<Vec<String>, ApiError> {
        Ok(self.repo_labels())
    }

    async fn create_repo_label(&self, _repo: &RepoId, label: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        state.repo_labels.push(label.to_string());
        state.calls.push(Call::CreateRepoLabel(label.to_string()));
        Ok(())
    }

    async fn get_pr_labels(&self, _pr: &PrIssueRef) -> Result<Vec<String>, ApiError> {
        Ok(self.pr_labels())
    }

    async fn add_pr_label(&self, _pr: &PrIssueRef, label: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::AddPrLabel(label.to_string()));
        if state.fail_label_adds.contains(label) {
            return Err(ApiError::from_status(500, format!("cannot add {label}")));
        }
        if !state.pr_labels.iter().any(|l| l == label) {
            state.pr_labels.push(label.to_string());
        }
        Ok(())
    }

    async fn remove_pr_label(&self, _pr: &PrIssueRef, label: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::RemovePrLabel(label.to_string()));
        state.pr_labels.retain(|l| l != label);
        Ok(())
    }

    async fn add_issue_labels(&self, _issue: &PrIssueRef, labels: &[String]) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::AddIssueLabels(labels.to_vec()));
        if let Some(bad) = labels.iter().find(|l| state.fail_label_adds.contains(*l)) {
            return Err(ApiError::from_status(500, format!("cannot add {bad}")));
        }
        for label in labels {
            if !state.pr_labels.contains(label) {
                state.pr_labels.push(label.clone());
            }
        }
        Ok(())
    }

    async fn remove_issue_label(&self, _issue: &PrIssueRef, label: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::RemoveIssueLabel(label.to_string()));
        if !state.pr_labels.iter().any(|l| l == label) {
            return Err(ApiError::from_status(404, "Label does not exist"));
        }
        state.pr_labels.retain(|l| l != label);
        Ok(())
    }

    async fn create_pr_comment(&self, _pr: &PrIssueRef, body: &str) -> Result<(), ApiError> {
        self.record_comment(Call::PrComment(body.to_string()))
    }

    async fn create_pr_comment_reply(
        &self,
        _pr: &PrIssueRef,
        body: &str,
        comment_id: &str,
    ) -> Result<(), ApiError> {
        self.record_comment(Call::PrCommentReply {
            body: body.to_string(),
            comment_id: comment_id.to_string(),
        })
    }

    async fn create_issue_comment(&self, _issue: &PrIssueRef, body: &str) -> Result<(), ApiError> {
        self.record_comment(Call::IssueComment(body.to_string()))
    }

    async fn list_pr_comments(&self, _pr: &PrIssueRef) -> Result<Vec<PrComment>, ApiError> {
        Ok(self.state.lock().unwrap().comments.clone())
    }

    async fn get_pull_request_changes(&self, _pr: &PrIssueRef) -> Result<Vec<ChangedFile>, ApiError> {
        Ok(self.state.lock().unwrap().changes.clone())
    }

    async fn get_path_content(
        &self,
        repo: &RepoId,
        path: &str,
        branch: &str,
    ) -> Result<PathContent, ApiError> {
        let state = self.state.lock().unwrap();
        state
            .files
            .get(&(repo.to_string(), branch.to_string(), path.to_string()))
            .map(|content| PathContent {
                path: path.to_string(),
                sha: "0000".to_string(),
                content: content.clone(),
            })
            .ok_or_else(|| ApiError::from_status(404, format!("{path} not found")))
    }

    async fn list_operation_logs(&self, _pr: &PrIssueRef) -> Result<Vec<OperationLogEntry>, ApiError> {
        let state = self.state.lock().unwrap();
        if state.fail_operation_logs {
            return Err(ApiError::from_status(502, "timeline unavailable"));
        }
        Ok(state.operation_logs.clone())
    }

    async fn get_user_permission_of_repo(
        &self,
        _repo: &RepoId,
        login: &str,
    ) -> Result<UserPermission, ApiError> {
        let state = self.state.lock().unwrap();
        Ok(UserPermission(
            state
                .permissions
                .get(login)
                .cloned()
                .unwrap_or_else(|| "read".to_string()),
        ))
    }

    async fn merge_pr(&self, _pr: &PrIssueRef, options: &MergeOptions) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Merge(options.clone()));
        if state.merge_conflict {
            return Err(ApiError {
                kind: ApiErrorKind::MergeConflict,
                status_code: Some(405),
                message: "Merge failed: there are conflicting files".to_string(),
                source: None,
            });
        }
        Ok(())
    }

    async fn assign_pr(&self, _pr: &PrIssueRef, logins: &[String]) -> Result<(), ApiError> {
        self.record(Call::Assign(logins.to_vec()));
        Ok(())
    }

    async fn is_collaborator(&self, _repo: &RepoId, login: &str) -> Result<bool, ApiError> {
        Ok(self.state.lock().unwrap().collaborators.contains(login))
    }
}

// ─── SIG cache double ────────────────────────────────────────────────────────

/// In-memory [`SigInfoCache`] keyed by file name.
#[derive(Debug, Default)]
pub struct MockSigCache {
    files: Mutex<HashMap<String, Vec<SigFile>>>,
}

impl MockSigCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a plain-text file; reads return it base64-encoded.
    pub fn with_file(self, file_name: &str, path: &str, text: &str) -> Self {
        self.files
            .lock()
            .unwrap()
            .entry(file_name.to_string())
            .or_default()
            .push(SigFile {
                path: path.to_string(),
                content: encode(text),
            });
        self
    }
}

impl SigInfoCache for MockSigCache {
    async fn get_sig_files(
        &self,
        _org: &str,
        _repo: &str,
        _branch: &str,
        file_name: &str,
    ) -> Result<Vec<SigFile>, SigCacheError> {
        Ok(self
            .files
            .lock()
            .unwrap()
            .get(file_name)
            .cloned()
            .unwrap_or_default())
    }
}

// ─── Event builders ──────────────────────────────────────────────────────────

pub fn repo() -> RepoId {
    RepoId::new("openeuler", "kernel")
}

pub fn pr_info(author: &str, labels: &[&str]) -> PullRequestInfo {
    PullRequestInfo {
        number: 7,
        title: "Fix the scheduler".to_string(),
        state: "open".to_string(),
        html_url: "https://atomgit.com/openeuler/kernel/pulls/7".to_string(),
        author: author.to_string(),
        labels: labels.iter().map(|l| l.to_string()).collect(),
        base_ref: "master".to_string(),
        head_ref: "fix".to_string(),
        head_sha: "abc123".to_string(),
        mergeable: Some(true),
        merge_commit_sha: Some("def456".to_string()),
        assignees: vec![],
        requested_reviewers: vec![],
    }
}

pub fn pr_event(action: PrAction, pull_request: PullRequestInfo) -> PullRequestEvent {
    PullRequestEvent {
        repo: repo(),
        action,
        sender: pull_request.author.clone(),
        pull_request,
    }
}

pub fn review_comment(
    commenter: &str,
    body: &str,
    pull_request: PullRequestInfo,
) -> ReviewCommentEvent {
    ReviewCommentEvent {
        repo: repo(),
        action: CommentAction::Created,
        pull_request,
        comment: CommentInfo {
            id: "c-1".to_string(),
            body: body.to_string(),
            author: commenter.to_string(),
            commit_id: None,
            html_url: String::new(),
        },
    }
}

pub fn pr_ref() -> PrIssueRef {
    PrIssueRef::new("openeuler", "kernel", 7)
}
