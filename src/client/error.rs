//! Platform API error types.
//!
//! Errors are classified so the retry layer knows what to do with them:
//!
//! - **Transient** errors are retried (5xx, rate limits, network failures)
//! - **Permanent** errors are returned to the caller (most 4xx)
//! - **MergeConflict** is a rejected merge because the PR has conflicting
//!   files. Retrying cannot help; the caller reports it on the PR instead.

use std::fmt;
use thiserror::Error;

/// The kind of platform API error, categorized for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// Safe to retry with backoff.
    ///
    /// - HTTP 5xx
    /// - HTTP 429, or 403 with a rate-limit message
    /// - Network timeouts and connection failures
    Transient,

    /// Requires a different request or human intervention.
    Permanent,

    /// The merge was refused because of conflicting files.
    MergeConflict,
}

impl ApiErrorKind {
    pub fn is_retriable(&self) -> bool {
        matches!(self, ApiErrorKind::Transient)
    }
}

/// A platform API error with categorization for retry decisions.
#[derive(Debug, Error)]
pub struct ApiError {
    pub kind: ApiErrorKind,

    /// The HTTP status code, if available.
    pub status_code: Option<u16>,

    pub message: String,

    /// The underlying octocrab error, if available.
    #[source]
    pub source: Option<octocrab::Error>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "AtomGit API error (HTTP {}): {}", code, self.message),
            None => write!(f, "AtomGit API error: {}", self.message),
        }
    }
}

impl ApiError {
    /// Creates a transient error from an octocrab error.
    pub fn transient(message: impl Into<String>, source: octocrab::Error) -> Self {
        let status_code = Self::extract_status_code(&source);
        Self {
            kind: ApiErrorKind::Transient,
            status_code,
            message: message.into(),
            source: Some(source),
        }
    }

    /// Creates a permanent error from an octocrab error.
    pub fn permanent(message: impl Into<String>, source: octocrab::Error) -> Self {
        let status_code = Self::extract_status_code(&source);
        Self {
            kind: ApiErrorKind::Permanent,
            status_code,
            message: message.into(),
            source: Some(source),
        }
    }

    /// Creates a merge-conflict error from the platform's merge rejection.
    pub fn merge_conflict(source: octocrab::Error) -> Self {
        let status_code = Self::extract_status_code(&source);
        Self {
            kind: ApiErrorKind::MergeConflict,
            status_code,
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Creates a permanent error without an octocrab source.
    pub fn permanent_without_source(message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::Permanent,
            status_code: None,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a transient error without an octocrab source.
    pub fn transient_without_source(message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::Transient,
            status_code: None,
            message: message.into(),
            source: None,
        }
    }

    /// Creates an error carrying only an HTTP status, classified like a
    /// response from the platform.
    pub fn from_status(status_code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: classify_status(status_code, &message),
            status_code: Some(status_code),
            message,
            source: None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code == Some(404)
    }

    /// Categorizes an octocrab error by status code and message.
    pub fn from_octocrab(err: octocrab::Error) -> Self {
        let status_code = Self::extract_status_code(&err);
        let message = err.to_string();

        let kind = if is_transient_message(&message) {
            ApiErrorKind::Transient
        } else {
            match status_code {
                Some(code) => classify_status(code, &message),
                None if is_network_error(&message) => ApiErrorKind::Transient,
                None => ApiErrorKind::Permanent,
            }
        };

        Self {
            kind,
            status_code,
            message,
            source: Some(err),
        }
    }

    /// Extracts the HTTP status code from an octocrab error, if present.
    ///
    /// Platform error responses carry the status directly. For everything
    /// else this falls back to matching the formatted message, which returns
    /// `None` (and so a conservative classification) when nothing matches.
    fn extract_status_code(err: &octocrab::Error) -> Option<u16> {
        if let octocrab::Error::GitHub { source, .. } = err {
            return Some(source.status_code.as_u16());
        }

        let err_str = err.to_string();

        if let Some(idx) = err_str.find("status: ") {
            let rest = &err_str[idx + 8..];
            let end = rest
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(rest.len());
            if let Ok(code) = rest[..end].parse() {
                return Some(code);
            }
        }

        if err_str.contains("404") && err_str.to_lowercase().contains("not found") {
            return Some(404);
        }

        [422, 403, 401, 429, 500, 502, 503]
            .into_iter()
            .find(|code| err_str.contains(&code.to_string()))
    }
}

fn classify_status(code: u16, message: &str) -> ApiErrorKind {
    match code {
        429 => ApiErrorKind::Transient,
        403 if is_rate_limit_error(message) => ApiErrorKind::Transient,
        code if (500..600).contains(&code) => ApiErrorKind::Transient,
        _ => ApiErrorKind::Permanent,
    }
}

/// Checks if an error message indicates a condition that clears on retry.
fn is_transient_message(message: &str) -> bool {
    let message_lower = message.to_lowercase();
    message_lower.contains("try again") || message_lower.contains("service unavailable")
}

/// Checks if an error message indicates a rate limit.
fn is_rate_limit_error(message: &str) -> bool {
    let message_lower = message.to_lowercase();
    message_lower.contains("rate limit")
        || message_lower.contains("api rate")
        || message_lower.contains("too many requests")
}

/// Checks if an error message indicates a network-level error.
fn is_network_error(message: &str) -> bool {
    let message_lower = message.to_lowercase();
    message_lower.contains("timeout")
        || message_lower.contains("connection")
        || message_lower.contains("network")
        || message_lower.contains("dns")
        || message_lower.contains("timed out")
}

/// Checks if a merge rejection is due to conflicting files.
pub fn is_merge_conflict_message(message: &str) -> bool {
    message.to_lowercase().contains("there are conflicting files")
}
