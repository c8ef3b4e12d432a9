//! Typed values returned by the platform client.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::ApiError;

/// A user's permission level on a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPermission(pub String);

impl UserPermission {
    /// Admin and write access both count as collaborator permission.
    pub fn can_write(&self) -> bool {
        matches!(self.0.as_str(), "admin" | "write")
    }
}

/// One file touched by a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChangedFile {
    pub filename: String,
    #[serde(default)]
    pub status: String,
}

/// A file read from a repository at some ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathContent {
    pub path: String,
    pub sha: String,
    /// Base64 as returned by the platform; may contain line breaks.
    pub content: String,
}

impl PathContent {
    pub fn decode(&self) -> Result<Vec<u8>, ApiError> {
        decode_base64(&self.content)
    }
}

/// Decodes base64 file content, ignoring the line breaks the platform inserts.
pub fn decode_base64(content: &str) -> Result<Vec<u8>, ApiError> {
    let compact: String = content.split_whitespace().collect();
    STANDARD.decode(compact).map_err(|e| {
        ApiError::permanent_without_source(format!("invalid base64 file content: {e}"))
    })
}

/// The kind of an entry in a pull request's operation log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationKind {
    LabelAdded,
    LabelRemoved,
    Other(String),
}

impl OperationKind {
    /// Maps the platform's timeline event name. `1231` is the platform's
    /// numeric code for a label add.
    pub fn from_wire(event: &str) -> Self {
        match event {
            "1231" | "labeled" => OperationKind::LabelAdded,
            "unlabeled" => OperationKind::LabelRemoved,
            other => OperationKind::Other(other.to_string()),
        }
    }
}

/// What an operation log entry says it is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSubject {
    /// A label name from the entry's structured label data.
    Label(String),
    /// The free-text body of a log line without label data.
    Body(String),
}

/// One entry of a pull request's operation log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationLogEntry {
    pub kind: OperationKind,
    pub subject: LogSubject,
    pub actor: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl OperationLogEntry {
    pub fn is_label_add_of(&self, label: &str) -> bool {
        self.kind == OperationKind::LabelAdded && self.references_label(label)
    }

    /// Label names compare exactly, ignoring case; free-text bodies are
    /// searched.
    pub fn references_label(&self, label: &str) -> bool {
        match &self.subject {
            LogSubject::Label(name) => name.eq_ignore_ascii_case(label),
            LogSubject::Body(text) => text.contains(label),
        }
    }
}

/// A comment on a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrComment {
    pub id: String,
    pub body: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PrComment {
    pub fn is_edited(&self) -> bool {
        self.updated_at != self.created_at
    }
}

/// How a pull request is merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMethod {
    #[default]
    Merge,
    Squash,
    Rebase,
}

impl MergeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeMethod::Merge => "merge",
            MergeMethod::Squash => "squash",
            MergeMethod::Rebase => "rebase",
        }
    }

    /// Parses a method name; unknown names are `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "squash" => Some(MergeMethod::Squash),
            "rebase" => Some(MergeMethod::Rebase),
            "merge" => Some(MergeMethod::Merge),
            _ => None,
        }
    }
}

impl fmt::Display for MergeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters for merging a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOptions {
    pub method: MergeMethod,
    /// Commit message body.
    pub message: String,
    /// The merge commit SHA the decision was made against.
    pub sha: Option<String>,
}
