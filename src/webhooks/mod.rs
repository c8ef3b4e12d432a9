//! Webhook handling for AtomGit events.
//!
//! This module provides:
//! - Signature verification for relayed payloads (HMAC-SHA256)
//! - Typed event definitions
//! - Payload parsing keyed on the event-type header

pub mod events;
pub mod parser;
pub mod signature;

pub use events::{
    AccessEvent, CommentAction, CommentInfo, EventEnvelope, EventKind, IssueCommentEvent,
    IssueEvent, IssueInfo, PrAction, PullRequestEvent, PullRequestInfo, PushEvent,
    ReviewCommentEvent, ReviewEvent, ReviewInfo,
};
pub use parser::{ParseError, RELAY_EVENT_PREFIX, parse_webhook};
pub use signature::{
    SIGNATURE_PREFIX, compute_signature, format_signature_header, parse_signature_header,
    verify_signature,
};
