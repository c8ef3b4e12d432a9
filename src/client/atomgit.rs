//! [`PlatformClient`] over the AtomGit REST API, using octocrab's raw
//! request methods.

use std::future::Future;

use chrono::{DateTime, Utc};
use octocrab::Octocrab;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::{ApiError, is_merge_conflict_message};
use super::models::{
    ChangedFile, LogSubject, MergeOptions, OperationKind, OperationLogEntry, PathContent, PrComment,
    UserPermission,
};
use super::retry::{RetryConfig, RetryPolicy, retry_with_backoff};
use super::PlatformClient;
use crate::types::{PrIssueRef, RepoId};

const PER_PAGE: usize = 100;

/// An AtomGit API client.
#[derive(Clone)]
pub struct AtomGitClient {
    client: Octocrab,
    retry_config: RetryConfig,
    retry_policy: RetryPolicy,
}

impl AtomGitClient {
    pub fn new(client: Octocrab) -> Self {
        Self {
            client,
            retry_config: RetryConfig::DEFAULT,
            retry_policy: RetryPolicy::RetryTransient,
        }
    }

    /// Creates a client for `endpoint` authenticated with a personal token.
    pub fn from_token(endpoint: &str, token: impl Into<String>) -> Result<Self, octocrab::Error> {
        let client = Octocrab::builder()
            .base_uri(endpoint)?
            .personal_token(token.into())
            .build()?;
        Ok(Self::new(client))
    }

    pub fn with_retry(mut self, config: RetryConfig, policy: RetryPolicy) -> Self {
        self.retry_config = config;
        self.retry_policy = policy;
        self
    }

    pub fn inner(&self) -> &Octocrab {
        &self.client
    }

    async fn retrying<T, F, Fut>(&self, operation: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        retry_with_backoff(self.retry_config, self.retry_policy, operation)
            .await
            .into_result()
    }

    async fn get_json<R>(&self, route: &str) -> Result<R, ApiError>
    where
        R: DeserializeOwned + Send,
    {
        self.retrying(move || async move {
            let result: Result<R, _> = self.client.get(route, None::<&()>).await;
            result.map_err(ApiError::from_octocrab)
        })
        .await
    }

    async fn post_json<B>(&self, route: &str, body: &B) -> Result<(), ApiError>
    where
        B: Serialize + Sync + ?Sized,
    {
        self.retrying(move || async move {
            let result: Result<serde_json::Value, _> = self.client.post(route, Some(body)).await;
            result.map(|_| ()).map_err(ApiError::from_octocrab)
        })
        .await
    }

    /// Sends a DELETE, returning the HTTP status of a failed response as an
    /// error.
    async fn delete(&self, route: &str) -> Result<(), ApiError> {
        self.retrying(move || async move {
            let response = self
                .client
                ._delete(route, None::<&()>)
                .await
                .map_err(ApiError::from_octocrab)?;
            octocrab::map_github_error(response)
                .await
                .map(|_| ())
                .map_err(ApiError::from_octocrab)
        })
        .await
    }

    /// Fetches every page of a list endpoint.
    ///
    /// A page shorter than `PER_PAGE` is the last one.
    async fn get_all_pages<R>(&self, route: &str) -> Result<Vec<R>, ApiError>
    where
        R: DeserializeOwned + Send,
    {
        let mut page = 1u32;
        let mut all = Vec::new();

        loop {
            let url = format!("{route}?per_page={PER_PAGE}&page={page}");
            let items: Vec<R> = self.get_json(&url).await?;
            let is_last_page = items.len() < PER_PAGE;
            all.extend(items);

            if is_last_page {
                break;
            }
            page += 1;
        }

        Ok(all)
    }
}

impl std::fmt::Debug for AtomGitClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomGitClient")
            .field("retry_config", &self.retry_config)
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

fn repo_route(repo: &RepoId) -> String {
    format!("/repos/{}/{}", repo.org, repo.repo)
}

fn issue_route(issue: &PrIssueRef) -> String {
    format!(
        "/repos/{}/{}/issues/{}",
        issue.org(),
        issue.repo(),
        issue.number()
    )
}

fn pull_route(pr: &PrIssueRef) -> String {
    format!("/repos/{}/{}/pulls/{}", pr.org(), pr.repo(), pr.number())
}

// ─── Wire Types ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RawPull {
    #[serde(default)]
    labels: Vec<RawLabel>,
}

/// Identifiers and event codes arrive as either numbers or strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawScalar {
    Number(i64),
    Text(String),
}

impl RawScalar {
    fn into_string(self) -> String {
        match self {
            RawScalar::Number(n) => n.to_string(),
            RawScalar::Text(s) => s,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawComment {
    id: RawScalar,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    user: Option<RawUser>,
    #[serde(default)]
    created_at: DateTime<Utc>,
    #[serde(default)]
    updated_at: DateTime<Utc>,
}

impl From<RawComment> for PrComment {
    fn from(raw: RawComment) -> Self {
        PrComment {
            id: raw.id.into_string(),
            body: raw.body.unwrap_or_default(),
            author: raw.user.map(|u| u.login).unwrap_or_default(),
            created_at: raw.created_at,
            updated_at: raw.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawTimelineEntry {
    #[serde(default)]
    event: Option<RawScalar>,
    #[serde(default)]
    label: Option<RawLabel>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    actor: Option<RawUser>,
    #[serde(default)]
    user: Option<RawUser>,
    #[serde(default)]
    created_at: DateTime<Utc>,
}

impl From<RawTimelineEntry> for OperationLogEntry {
    fn from(raw: RawTimelineEntry) -> Self {
        let kind = raw
            .event
            .map(|e| OperationKind::from_wire(&e.into_string()))
            .unwrap_or_else(|| OperationKind::Other(String::new()));
        let subject = match raw.label {
            Some(label) => LogSubject::Label(label.name),
            None => LogSubject::Body(raw.body.unwrap_or_default()),
        };

        OperationLogEntry {
            kind,
            subject,
            actor: raw.actor.or(raw.user).map(|u| u.login),
            created_at: raw.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawContent {
    path: String,
    #[serde(default)]
    sha: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct RawPermission {
    permission: String,
}

// ─── PlatformClient ───────────────────────────────────────────────────────────

impl PlatformClient for AtomGitClient {
    async fn get_repository_labels(&self, repo: &RepoId) -> Result<Vec<String>, ApiError> {
        let labels: Vec<RawLabel> = self
            .get_all_pages(&format!("{}/labels", repo_route(repo)))
            .await?;
        Ok(labels.into_iter().map(|l| l.name).collect())
    }

    async fn create_repo_label(&self, repo: &RepoId, label: &str) -> Result<(), ApiError> {
        #[derive(Serialize)]
        struct CreateLabel<'a> {
            name: &'a str,
        }

        self.post_json(
            &format!("{}/labels", repo_route(repo)),
            &CreateLabel { name: label },
        )
        .await
    }

    async fn get_pr_labels(&self, pr: &PrIssueRef) -> Result<Vec<String>, ApiError> {
        let pull: RawPull = self.get_json(&pull_route(pr)).await?;
        Ok(pull.labels.into_iter().map(|l| l.name).collect())
    }

    async fn add_pr_label(&self, pr: &PrIssueRef, label: &str) -> Result<(), ApiError> {
        self.add_issue_labels(pr, &[label.to_string()]).await
    }

    async fn remove_pr_label(&self, pr: &PrIssueRef, label: &str) -> Result<(), ApiError> {
        match self.remove_issue_label(pr, label).await {
            Err(e) if e.is_not_found() => Ok(()),
            other => other,
        }
    }

    async fn add_issue_labels(&self, issue: &PrIssueRef, labels: &[String]) -> Result<(), ApiError> {
        self.post_json(&format!("{}/labels", issue_route(issue)), labels)
            .await
    }

    async fn remove_issue_label(&self, issue: &PrIssueRef, label: &str) -> Result<(), ApiError> {
        self.delete(&format!(
            "{}/labels/{}",
            issue_route(issue),
            urlencoding::encode(label)
        ))
        .await
    }

    async fn create_pr_comment(&self, pr: &PrIssueRef, body: &str) -> Result<(), ApiError> {
        #[derive(Serialize)]
        struct Comment<'a> {
            body: &'a str,
        }

        self.post_json(&format!("{}/comments", pull_route(pr)), &Comment { body })
            .await
    }

    async fn create_pr_comment_reply(
        &self,
        pr: &PrIssueRef,
        body: &str,
        comment_id: &str,
    ) -> Result<(), ApiError> {
        #[derive(Serialize)]
        struct Reply<'a> {
            body: &'a str,
            in_reply_to: &'a str,
        }

        self.post_json(
            &format!("{}/comments", pull_route(pr)),
            &Reply {
                body,
                in_reply_to: comment_id,
            },
        )
        .await
    }

    async fn create_issue_comment(&self, issue: &PrIssueRef, body: &str) -> Result<(), ApiError> {
        #[derive(Serialize)]
        struct Comment<'a> {
            body: &'a str,
        }

        self.post_json(&format!("{}/comments", issue_route(issue)), &Comment { body })
            .await
    }

    async fn list_pr_comments(&self, pr: &PrIssueRef) -> Result<Vec<PrComment>, ApiError> {
        let comments: Vec<RawComment> = self
            .get_all_pages(&format!("{}/comments", pull_route(pr)))
            .await?;
        Ok(comments.into_iter().map(PrComment::from).collect())
    }

    async fn get_pull_request_changes(&self, pr: &PrIssueRef) -> Result<Vec<ChangedFile>, ApiError> {
        self.get_all_pages(&format!("{}/files", pull_route(pr))).await
    }

    async fn get_path_content(
        &self,
        repo: &RepoId,
        path: &str,
        branch: &str,
    ) -> Result<PathContent, ApiError> {
        let raw: RawContent = self
            .get_json(&format!(
                "{}/contents/{}?ref={}",
                repo_route(repo),
                path,
                urlencoding::encode(branch)
            ))
            .await?;

        Ok(PathContent {
            path: raw.path,
            sha: raw.sha,
            content: raw.content,
        })
    }

    async fn list_operation_logs(&self, pr: &PrIssueRef) -> Result<Vec<OperationLogEntry>, ApiError> {
        let entries: Vec<RawTimelineEntry> = self
            .get_all_pages(&format!("{}/timeline", issue_route(pr)))
            .await?;
        Ok(entries.into_iter().map(OperationLogEntry::from).collect())
    }

    async fn get_user_permission_of_repo(
        &self,
        repo: &RepoId,
        login: &str,
    ) -> Result<UserPermission, ApiError> {
        let raw: RawPermission = self
            .get_json(&format!(
                "{}/collaborators/{}/permission",
                repo_route(repo),
                login
            ))
            .await?;
        Ok(UserPermission(raw.permission))
    }

    async fn merge_pr(&self, pr: &PrIssueRef, options: &MergeOptions) -> Result<(), ApiError> {
        #[derive(Serialize)]
        struct MergeRequest<'a> {
            commit_message: &'a str,
            merge_method: &'static str,
            #[serde(skip_serializing_if = "Option::is_none")]
            sha: Option<&'a str>,
        }

        let route = format!("{}/merge", pull_route(pr));
        let request = MergeRequest {
            commit_message: &options.message,
            merge_method: options.method.as_str(),
            sha: options.sha.as_deref(),
        };

        let (route, request) = (&route, &request);
        self.retrying(move || async move {
            let result: Result<serde_json::Value, _> =
                self.client.put(route, Some(request)).await;
            match result {
                Ok(_) => Ok(()),
                Err(e) if is_merge_conflict_message(&e.to_string()) => {
                    Err(ApiError::merge_conflict(e))
                }
                Err(e) => Err(ApiError::from_octocrab(e)),
            }
        })
        .await
    }

    async fn assign_pr(&self, pr: &PrIssueRef, logins: &[String]) -> Result<(), ApiError> {
        #[derive(Serialize)]
        struct Assignees<'a> {
            assignees: &'a [String],
        }

        self.post_json(
            &format!("{}/assignees", issue_route(pr)),
            &Assignees { assignees: logins },
        )
        .await
    }

    async fn is_collaborator(&self, repo: &RepoId, login: &str) -> Result<bool, ApiError> {
        let route = format!("{}/collaborators/{}", repo_route(repo), login);
        let route = route.as_str();

        self.retrying(move || async move {
            let response = self
                .client
                ._get(route)
                .await
                .map_err(ApiError::from_octocrab)?;

            match response.status().as_u16() {
                200 | 204 => Ok(true),
                404 => Ok(false),
                code => Err(ApiError::from_status(
                    code,
                    format!("unexpected status checking collaborator {login}"),
                )),
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use axum::extract::{Path, Query};
    use axum::http::StatusCode;
    use axum::routing::{delete, get, post, put};
    use axum::{Json, Router};
    use serde_json::{Value, json};

    use crate::client::models::MergeMethod;
    use crate::client::ApiErrorKind;
    use crate::test_utils::spawn_test_server;

    async fn client_for(router: Router) -> AtomGitClient {
        let base = spawn_test_server(router).await;
        AtomGitClient::from_token(&base, "token")
            .unwrap()
            .with_retry(RetryConfig::DEFAULT, RetryPolicy::NoRetry)
    }

    fn pr() -> PrIssueRef {
        PrIssueRef::new("openeuler", "kernel", 7)
    }

    #[derive(Deserialize)]
    struct Page {
        page: u32,
        per_page: usize,
    }

    // ─── Pagination ───

    #[tokio::test]
    async fn repository_labels_drain_all_pages() {
        let router = Router::new().route(
            "/repos/openeuler/kernel/labels",
            get(|Query(p): Query<Page>| async move {
                let count = if p.page == 1 { p.per_page } else { 3 };
                let labels: Vec<Value> = (0..count)
                    .map(|i| json!({ "name": format!("p{}-{}", p.page, i) }))
                    .collect();
                Json(labels)
            }),
        );
        let client = client_for(router).await;

        let labels = client
            .get_repository_labels(&RepoId::new("openeuler", "kernel"))
            .await
            .unwrap();

        assert_eq!(labels.len(), 103);
        assert_eq!(labels[0], "p1-0");
        assert_eq!(labels[102], "p2-2");
    }

    // ─── Labels ───

    #[tokio::test]
    async fn remove_missing_pr_label_is_success() {
        let router = Router::new().route(
            "/repos/openeuler/kernel/issues/7/labels/{label}",
            delete(|| async { (StatusCode::NOT_FOUND, Json(json!({ "message": "Not Found" }))) }),
        );
        let client = client_for(router).await;

        client.remove_pr_label(&pr(), "lgtm").await.unwrap();
    }

    #[tokio::test]
    async fn remove_issue_label_surfaces_not_found() {
        let router = Router::new().route(
            "/repos/openeuler/kernel/issues/7/labels/{label}",
            delete(|| async { (StatusCode::NOT_FOUND, Json(json!({ "message": "Not Found" }))) }),
        );
        let client = client_for(router).await;

        let err = client.remove_issue_label(&pr(), "lgtm").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn remove_label_encodes_slash() {
        let router = Router::new().route(
            "/repos/openeuler/kernel/issues/7/labels/{label}",
            delete(|Path(label): Path<String>| async move {
                assert_eq!(label, "sig/Kernel");
                Json(json!([]))
            }),
        );
        let client = client_for(router).await;

        client.remove_pr_label(&pr(), "sig/Kernel").await.unwrap();
    }

    #[tokio::test]
    async fn pr_labels_come_from_pull() {
        let router = Router::new().route(
            "/repos/openeuler/kernel/pulls/7",
            get(|| async { Json(json!({ "number": 7, "labels": [{ "name": "lgtm" }, { "name": "approved" }] })) }),
        );
        let client = client_for(router).await;

        let labels = client.get_pr_labels(&pr()).await.unwrap();
        assert_eq!(labels, vec!["lgtm", "approved"]);
    }

    // ─── Operation log ───

    #[tokio::test]
    async fn operation_logs_map_structured_and_text_entries() {
        let router = Router::new().route(
            "/repos/openeuler/kernel/issues/7/timeline",
            get(|| async {
                Json(json!([
                    {
                        "event": "labeled",
                        "label": { "name": "approved" },
                        "actor": { "login": "alice" },
                        "created_at": "2024-01-02T03:04:05Z"
                    },
                    {
                        "event": 1231,
                        "body": "add label lgtm",
                        "user": { "login": "bob" },
                        "created_at": "2024-01-03T00:00:00Z"
                    }
                ]))
            }),
        );
        let client = client_for(router).await;

        let logs = client.list_operation_logs(&pr()).await.unwrap();

        assert_eq!(logs.len(), 2);
        assert!(logs[0].is_label_add_of("approved"));
        assert_eq!(logs[0].actor.as_deref(), Some("alice"));
        assert!(logs[1].is_label_add_of("lgtm"));
        assert_eq!(logs[1].actor.as_deref(), Some("bob"));
    }

    // ─── Merge ───

    #[tokio::test]
    async fn merge_sends_method_and_sha() {
        let router = Router::new().route(
            "/repos/openeuler/kernel/pulls/7/merge",
            put(|Json(body): Json<Value>| async move {
                assert_eq!(body["merge_method"], "squash");
                assert_eq!(body["sha"], "abc123");
                assert_eq!(body["commit_message"], "\nFrom: @alice \n");
                Json(json!({ "merged": true }))
            }),
        );
        let client = client_for(router).await;

        let options = MergeOptions {
            method: MergeMethod::Squash,
            message: "\nFrom: @alice \n".into(),
            sha: Some("abc123".into()),
        };
        client.merge_pr(&pr(), &options).await.unwrap();
    }

    #[tokio::test]
    async fn merge_conflict_is_classified() {
        let router = Router::new().route(
            "/repos/openeuler/kernel/pulls/7/merge",
            put(|| async {
                (
                    StatusCode::METHOD_NOT_ALLOWED,
                    Json(json!({ "message": "Merge failed: there are conflicting files" })),
                )
            }),
        );
        let client = client_for(router).await;

        let options = MergeOptions {
            method: MergeMethod::Merge,
            message: String::new(),
            sha: None,
        };
        let err = client.merge_pr(&pr(), &options).await.unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::MergeConflict);
    }

    // ─── Permissions ───

    #[tokio::test]
    async fn collaborator_check_maps_status() {
        let router = Router::new().route(
            "/repos/openeuler/kernel/collaborators/{login}",
            get(|Path(login): Path<String>| async move {
                if login == "alice" {
                    StatusCode::NO_CONTENT
                } else {
                    StatusCode::NOT_FOUND
                }
            }),
        );
        let client = client_for(router).await;
        let repo = RepoId::new("openeuler", "kernel");

        assert!(client.is_collaborator(&repo, "alice").await.unwrap());
        assert!(!client.is_collaborator(&repo, "mallory").await.unwrap());
    }

    #[tokio::test]
    async fn user_permission_is_read() {
        let router = Router::new().route(
            "/repos/openeuler/kernel/collaborators/{login}/permission",
            get(|| async { Json(json!({ "permission": "write" })) }),
        );
        let client = client_for(router).await;

        let permission = client
            .get_user_permission_of_repo(&RepoId::new("openeuler", "kernel"), "alice")
            .await
            .unwrap();
        assert!(permission.can_write());
    }

    // ─── Contents ───

    #[tokio::test]
    async fn path_content_passes_ref() {
        #[derive(Deserialize)]
        struct Ref {
            r#ref: String,
        }

        let router = Router::new().route(
            "/repos/openeuler/community/contents/{*path}",
            get(|Path(path): Path<String>, Query(q): Query<Ref>| async move {
                assert_eq!(path, "sig/Kernel/sig-info.yaml");
                assert_eq!(q.r#ref, "master");
                Json(json!({ "path": path, "sha": "s", "content": "bmFtZTogS2VybmVs" }))
            }),
        );
        let client = client_for(router).await;

        let content = client
            .get_path_content(
                &RepoId::new("openeuler", "community"),
                "sig/Kernel/sig-info.yaml",
                "master",
            )
            .await
            .unwrap();
        assert_eq!(content.decode().unwrap(), b"name: Kernel");
    }

    // ─── Retry ───

    #[tokio::test]
    async fn transient_failure_is_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let router = Router::new().route(
            "/repos/openeuler/kernel/issues/7/comments",
            post(move || {
                let count = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if count == 0 {
                        (StatusCode::BAD_GATEWAY, Json(json!({ "message": "bad gateway" })))
                    } else {
                        (StatusCode::CREATED, Json(json!({ "id": 1 })))
                    }
                }
            }),
        );
        let base = spawn_test_server(router).await;
        let client = AtomGitClient::from_token(&base, "token").unwrap().with_retry(
            RetryConfig::new(2, Duration::from_millis(1), Duration::from_millis(5), 2.0),
            RetryPolicy::RetryTransient,
        );

        client.create_issue_comment(&pr(), "hello").await.unwrap();
        assert!(calls.load(Ordering::SeqCst) >= 2);
    }
}
