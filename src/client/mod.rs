//! AtomGit platform client.
//!
//! [`PlatformClient`] is the set of REST capabilities the bots use. Bots are
//! generic over it; [`AtomGitClient`] implements it against the real API and
//! `test_utils` provides an in-memory double.
//!
//! - Paginated endpoints are fully drained
//! - Transient failures are retried with exponential backoff
//! - Removing a label that is not on the PR succeeds

mod atomgit;
mod error;
mod models;
mod retry;
pub mod sig_cache;

pub use atomgit::AtomGitClient;
pub use error::{ApiError, ApiErrorKind, is_merge_conflict_message};
pub use models::{
    ChangedFile, LogSubject, MergeMethod, MergeOptions, OperationKind, OperationLogEntry, PathContent,
    PrComment, UserPermission, decode_base64,
};
pub use retry::{RetryConfig, RetryPolicy, RetryResult, Retriable, retry_with_backoff};
pub use sig_cache::{HttpSigInfoCache, SigCacheError, SigFile, SigInfoCache};

use std::future::Future;

use crate::types::{PrIssueRef, RepoId};

/// REST capabilities of the code-hosting platform.
pub trait PlatformClient: Send + Sync + 'static {
    /// Lists every label defined in the repository.
    fn get_repository_labels(
        &self,
        repo: &RepoId,
    ) -> impl Future<Output = Result<Vec<String>, ApiError>> + Send;

    fn create_repo_label(
        &self,
        repo: &RepoId,
        label: &str,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Reads the labels currently on a pull request.
    fn get_pr_labels(
        &self,
        pr: &PrIssueRef,
    ) -> impl Future<Output = Result<Vec<String>, ApiError>> + Send;

    fn add_pr_label(
        &self,
        pr: &PrIssueRef,
        label: &str,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Removes a label from a pull request. A label that is already absent
    /// counts as removed.
    fn remove_pr_label(
        &self,
        pr: &PrIssueRef,
        label: &str,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn add_issue_labels(
        &self,
        issue: &PrIssueRef,
        labels: &[String],
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn remove_issue_label(
        &self,
        issue: &PrIssueRef,
        label: &str,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn create_pr_comment(
        &self,
        pr: &PrIssueRef,
        body: &str,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Replies to an existing review comment thread.
    fn create_pr_comment_reply(
        &self,
        pr: &PrIssueRef,
        body: &str,
        comment_id: &str,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn create_issue_comment(
        &self,
        issue: &PrIssueRef,
        body: &str,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn list_pr_comments(
        &self,
        pr: &PrIssueRef,
    ) -> impl Future<Output = Result<Vec<PrComment>, ApiError>> + Send;

    fn get_pull_request_changes(
        &self,
        pr: &PrIssueRef,
    ) -> impl Future<Output = Result<Vec<ChangedFile>, ApiError>> + Send;

    /// Reads a file at `branch`.
    fn get_path_content(
        &self,
        repo: &RepoId,
        path: &str,
        branch: &str,
    ) -> impl Future<Output = Result<PathContent, ApiError>> + Send;

    /// Lists the pull request's operation log (timeline), oldest first.
    fn list_operation_logs(
        &self,
        pr: &PrIssueRef,
    ) -> impl Future<Output = Result<Vec<OperationLogEntry>, ApiError>> + Send;

    fn get_user_permission_of_repo(
        &self,
        repo: &RepoId,
        login: &str,
    ) -> impl Future<Output = Result<UserPermission, ApiError>> + Send;

    fn merge_pr(
        &self,
        pr: &PrIssueRef,
        options: &MergeOptions,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn assign_pr(
        &self,
        pr: &PrIssueRef,
        logins: &[String],
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn is_collaborator(
        &self,
        repo: &RepoId,
        login: &str,
    ) -> impl Future<Output = Result<bool, ApiError>> + Send;
}
