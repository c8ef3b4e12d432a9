//! Forwarding relay deliveries to downstream bots.
//!
//! Each delivery is POSTed verbatim with the bot user agent, which downstream
//! ingress trusts without a signature. Transport failures are retried with
//! [`RetryConfig::FORWARD`]; any non-2xx response is a failure.

use axum::body::Bytes;
use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, warn};

use crate::client::{RetryConfig, RetryPolicy, Retriable, retry_with_backoff};
use crate::server::webhook::{BOT_USER_AGENT, HEADER_EVENT};

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("failed to send request: {0}")]
    Http(#[from] reqwest::Error),

    #[error("response has status {status:?} and body {body:?}")]
    Status { status: String, body: String },
}

impl Retriable for ForwardError {
    /// Only requests that never got a response are retried.
    fn is_retriable(&self) -> bool {
        matches!(self, ForwardError::Http(e) if e.status().is_none())
    }
}

#[derive(Debug, Clone)]
pub struct Forwarder {
    http: reqwest::Client,
    retry_config: RetryConfig,
}

impl Default for Forwarder {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

impl Forwarder {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            retry_config: RetryConfig::FORWARD,
        }
    }

    pub fn with_retry(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    /// Sends `payload` to every endpoint concurrently, returning the
    /// failures by endpoint.
    pub async fn forward_all<'e>(
        &self,
        endpoints: &[&'e str],
        event_type: &str,
        payload: &Bytes,
    ) -> Vec<(&'e str, ForwardError)> {
        let sends = endpoints.iter().map(|&endpoint| async move {
            let result = self.forward(endpoint, event_type, payload.clone()).await;
            (endpoint, result)
        });

        join_all(sends)
            .await
            .into_iter()
            .filter_map(|(endpoint, result)| result.err().map(|e| (endpoint, e)))
            .collect()
    }

    pub async fn forward(&self, endpoint: &str, event_type: &str, payload: Bytes) -> Result<(), ForwardError> {
        retry_with_backoff(self.retry_config, RetryPolicy::RetryTransient, move || {
            self.send(endpoint, event_type, payload.clone())
        })
        .await
        .into_result()
    }

    async fn send(&self, endpoint: &str, event_type: &str, payload: Bytes) -> Result<(), ForwardError> {
        let response = self
            .http
            .post(endpoint)
            .header(reqwest::header::USER_AGENT, BOT_USER_AGENT)
            .header(HEADER_EVENT, event_type)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .inspect_err(|e| warn!(endpoint, error = %e, "forward attempt failed"))?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ForwardError::Status {
                status: status.to_string(),
                body,
            });
        }
        debug!(endpoint, %status, "forwarded");
        Ok(())
    }
}
