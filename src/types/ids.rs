//! Newtype wrappers for domain identifiers.
//!
//! These types prevent accidental mixing of different identifiers (e.g. passing a
//! delivery ID where an org name is expected) and make the code more self-documenting.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A repository identifier (`org/repo` format).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoId {
    pub org: String,
    pub repo: String,
}

impl RepoId {
    pub fn new(org: impl Into<String>, repo: impl Into<String>) -> Self {
        RepoId {
            org: org.into(),
            repo: repo.into(),
        }
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.org, self.repo)
    }
}

/// The identity of an issue or pull request: the unit every label and comment
/// operation is keyed on.
///
/// Fields are private so a reference cannot be mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrIssueRef {
    org: String,
    repo: String,
    number: u64,
}

impl PrIssueRef {
    pub fn new(org: impl Into<String>, repo: impl Into<String>, number: u64) -> Self {
        PrIssueRef {
            org: org.into(),
            repo: repo.into(),
            number,
        }
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    /// Returns the repository this issue or PR lives in.
    pub fn repo_id(&self) -> RepoId {
        RepoId::new(&self.org, &self.repo)
    }
}

impl fmt::Display for PrIssueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.org, self.repo, self.number)
    }
}

/// A webhook delivery ID, as sent by the relay in `X-AtomGit-Delivery`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeliveryId(pub String);

impl DeliveryId {
    pub fn new(s: impl Into<String>) -> Self {
        DeliveryId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for DeliveryId {
    fn from(s: String) -> Self {
        DeliveryId(s)
    }
}
