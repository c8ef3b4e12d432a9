//! Handler registry: one slot per event category.
//!
//! Bots register async closures for the categories they care about. The
//! registry is built once at startup and handed to the dispatcher; categories
//! without a handler are ignored.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::types::DeliveryId;
use crate::webhooks::{
    AccessEvent, EventEnvelope, EventKind, IssueCommentEvent, IssueEvent, PullRequestEvent,
    PushEvent, ReviewCommentEvent, ReviewEvent,
};

/// Per-invocation context handed to every handler.
#[derive(Debug)]
pub struct HandlerContext<C> {
    /// Snapshot of the bot configuration taken when the event was dispatched.
    pub config: Arc<C>,
    pub delivery_id: Option<DeliveryId>,
}

impl<C> Clone for HandlerContext<C> {
    fn clone(&self) -> Self {
        HandlerContext {
            config: Arc::clone(&self.config),
            delivery_id: self.delivery_id.clone(),
        }
    }
}

pub type HandlerFuture = BoxFuture<'static, anyhow::Result<()>>;

/// A type-erased async event handler.
pub type Handler<E, C> = Arc<dyn Fn(E, HandlerContext<C>) -> HandlerFuture + Send + Sync>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("a handler for {0} events is already registered")]
    AlreadyRegistered(EventKind),
}

/// Registered handlers, at most one per [`EventKind`].
pub struct HandlerRegistry<C> {
    issue: Option<Handler<IssueEvent, C>>,
    issue_comment: Option<Handler<IssueCommentEvent, C>>,
    pull_request: Option<Handler<PullRequestEvent, C>>,
    push: Option<Handler<PushEvent, C>>,
    review: Option<Handler<ReviewEvent, C>>,
    review_comment: Option<Handler<ReviewCommentEvent, C>>,
    access: Option<Handler<AccessEvent, C>>,
}

impl<C> Default for HandlerRegistry<C> {
    fn default() -> Self {
        HandlerRegistry {
            issue: None,
            issue_comment: None,
            pull_request: None,
            push: None,
            review: None,
            review_comment: None,
            access: None,
        }
    }
}

fn register<E, C, F, Fut>(
    slot: &mut Option<Handler<E, C>>,
    kind: EventKind,
    handler: F,
) -> Result<(), RegistryError>
where
    F: Fn(E, HandlerContext<C>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    if slot.is_some() {
        return Err(RegistryError::AlreadyRegistered(kind));
    }
    *slot = Some(Arc::new(move |event, ctx| Box::pin(handler(event, ctx))));
    Ok(())
}

impl<C: Send + Sync + 'static> HandlerRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_issue<F, Fut>(&mut self, handler: F) -> Result<(), RegistryError>
    where
        F: Fn(IssueEvent, HandlerContext<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        register(&mut self.issue, EventKind::Issue, handler)
    }

    pub fn on_issue_comment<F, Fut>(&mut self, handler: F) -> Result<(), RegistryError>
    where
        F: Fn(IssueCommentEvent, HandlerContext<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        register(&mut self.issue_comment, EventKind::IssueComment, handler)
    }

    pub fn on_pull_request<F, Fut>(&mut self, handler: F) -> Result<(), RegistryError>
    where
        F: Fn(PullRequestEvent, HandlerContext<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        register(&mut self.pull_request, EventKind::PullRequest, handler)
    }

    pub fn on_push<F, Fut>(&mut self, handler: F) -> Result<(), RegistryError>
    where
        F: Fn(PushEvent, HandlerContext<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        register(&mut self.push, EventKind::Push, handler)
    }

    pub fn on_review<F, Fut>(&mut self, handler: F) -> Result<(), RegistryError>
    where
        F: Fn(ReviewEvent, HandlerContext<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        register(&mut self.review, EventKind::Review, handler)
    }

    pub fn on_review_comment<F, Fut>(&mut self, handler: F) -> Result<(), RegistryError>
    where
        F: Fn(ReviewCommentEvent, HandlerContext<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        register(&mut self.review_comment, EventKind::ReviewComment, handler)
    }

    pub fn on_access<F, Fut>(&mut self, handler: F) -> Result<(), RegistryError>
    where
        F: Fn(AccessEvent, HandlerContext<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        register(&mut self.access, EventKind::Access, handler)
    }

    pub fn is_registered(&self, kind: EventKind) -> bool {
        match kind {
            EventKind::Issue => self.issue.is_some(),
            EventKind::IssueComment => self.issue_comment.is_some(),
            EventKind::PullRequest => self.pull_request.is_some(),
            EventKind::Push => self.push.is_some(),
            EventKind::Review => self.review.is_some(),
            EventKind::ReviewComment => self.review_comment.is_some(),
            EventKind::Access => self.access.is_some(),
        }
    }

    /// Builds the handler future for `event`, or `None` when its category has
    /// no handler.
    pub fn handle(&self, event: EventEnvelope, ctx: HandlerContext<C>) -> Option<HandlerFuture> {
        match event {
            EventEnvelope::Issue(e) => self.issue.as_ref().map(|h| h(e, ctx)),
            EventEnvelope::IssueComment(e) => self.issue_comment.as_ref().map(|h| h(e, ctx)),
            EventEnvelope::PullRequest(e) => self.pull_request.as_ref().map(|h| h(e, ctx)),
            EventEnvelope::Push(e) => self.push.as_ref().map(|h| h(e, ctx)),
            EventEnvelope::Review(e) => self.review.as_ref().map(|h| h(e, ctx)),
            EventEnvelope::ReviewComment(e) => self.review_comment.as_ref().map(|h| h(e, ctx)),
            EventEnvelope::Access(e) => self.access.as_ref().map(|h| h(e, ctx)),
        }
    }
}
