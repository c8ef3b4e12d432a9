//! Client for the SIG-info cache service.
//!
//! The cache serves SIG metadata files (`sig-info.yaml`, `OWNERS`) collected
//! from the community repository:
//!
//! ```text
//! GET {endpoint}/v1/file/{org}/{repo}/{branch}/{file_name}
//! -> {"data": {"files": [{"path": "...", "content": "<base64>"}]}}
//! ```

use std::future::Future;

use serde::Deserialize;
use thiserror::Error;

use super::retry::{RetryConfig, RetryPolicy, Retriable, retry_with_backoff};

/// A file returned by the cache.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SigFile {
    pub path: String,
    /// Base64 file content.
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Error)]
pub enum SigCacheError {
    #[error("sig cache request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("sig cache returned status {status}: {body}")]
    Status { status: u16, body: String },
}

impl Retriable for SigCacheError {
    fn is_retriable(&self) -> bool {
        match self {
            SigCacheError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            SigCacheError::Status { status, .. } => *status >= 500 || *status == 429,
        }
    }
}

/// Read access to SIG metadata files.
pub trait SigInfoCache: Send + Sync + 'static {
    /// Returns every `file_name` file recorded for `org/repo` at `branch`.
    fn get_sig_files(
        &self,
        org: &str,
        repo: &str,
        branch: &str,
        file_name: &str,
    ) -> impl Future<Output = Result<Vec<SigFile>, SigCacheError>> + Send;
}

#[derive(Debug, Deserialize)]
struct FilesResponse {
    data: FilesData,
}

#[derive(Debug, Deserialize)]
struct FilesData {
    #[serde(default)]
    files: Vec<SigFile>,
}

/// [`SigInfoCache`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSigInfoCache {
    http: reqwest::Client,
    endpoint: String,
    retry_config: RetryConfig,
}

impl HttpSigInfoCache {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Self {
            http,
            endpoint,
            retry_config: RetryConfig::DEFAULT,
        }
    }

    pub fn with_retry(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    fn url(&self, org: &str, repo: &str, branch: &str, file_name: &str) -> String {
        format!(
            "{}/v1/file/{}/{}/{}/{}",
            self.endpoint,
            urlencoding::encode(org),
            urlencoding::encode(repo),
            urlencoding::encode(branch),
            urlencoding::encode(file_name)
        )
    }

    async fn fetch(&self, url: &str) -> Result<Vec<SigFile>, SigCacheError> {
        let response = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SigCacheError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let files: FilesResponse = response.json().await?;
        Ok(files.data.files)
    }
}

impl SigInfoCache for HttpSigInfoCache {
    async fn get_sig_files(
        &self,
        org: &str,
        repo: &str,
        branch: &str,
        file_name: &str,
    ) -> Result<Vec<SigFile>, SigCacheError> {
        let url = self.url(org, repo, branch, file_name);
        let url = url.as_str();

        retry_with_backoff(self.retry_config, RetryPolicy::RetryTransient, move || {
            self.fetch(url)
        })
        .await
        .into_result()
    }
}
