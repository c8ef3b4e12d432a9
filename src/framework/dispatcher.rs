//! Event dispatcher.
//!
//! Parses an authenticated delivery into an [`EventEnvelope`] and runs the
//! registered handler on its own tracked task, so the HTTP response never waits
//! for business logic. Shutdown closes the tracker and waits for every
//! in-flight handler.

use std::sync::Arc;

use thiserror::Error;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, error, info, info_span};

use super::registry::{HandlerContext, HandlerRegistry};
use crate::config::{BotConfig, ConfigAgent};
use crate::types::DeliveryId;
use crate::webhooks::{ParseError, parse_webhook};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to parse {event_type} payload: {source}")]
    Parse {
        event_type: String,
        #[source]
        source: ParseError,
    },
}

/// The part of the dispatcher the HTTP layer needs.
pub trait Dispatch: Send + Sync {
    fn dispatch(
        &self,
        event_type: &str,
        delivery_id: Option<&DeliveryId>,
        payload: &[u8],
    ) -> Result<(), DispatchError>;
}

/// Routes parsed events to registered handlers on tracked tasks.
pub struct Dispatcher<C> {
    registry: Arc<HandlerRegistry<C>>,
    config: ConfigAgent<C>,
    tracker: TaskTracker,
}

impl<C> Clone for Dispatcher<C> {
    fn clone(&self) -> Self {
        Dispatcher {
            registry: Arc::clone(&self.registry),
            config: self.config.clone(),
            tracker: self.tracker.clone(),
        }
    }
}

impl<C: BotConfig> Dispatcher<C> {
    pub fn new(registry: HandlerRegistry<C>, config: ConfigAgent<C>) -> Self {
        Dispatcher {
            registry: Arc::new(registry),
            config,
            tracker: TaskTracker::new(),
        }
    }

    /// Number of handler tasks still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Waits for every in-flight handler to finish.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

impl<C: BotConfig> Dispatch for Dispatcher<C> {
    fn dispatch(
        &self,
        event_type: &str,
        delivery_id: Option<&DeliveryId>,
        payload: &[u8],
    ) -> Result<(), DispatchError> {
        let event = match parse_webhook(event_type, payload) {
            Ok(Some(event)) => event,
            Ok(None) => {
                debug!(event_type, "ignoring unknown event type");
                return Ok(());
            }
            Err(source) => {
                return Err(DispatchError::Parse {
                    event_type: event_type.to_string(),
                    source,
                });
            }
        };

        let kind = event.kind();
        let (org, repo) = event
            .repo_id()
            .map(|r| (r.org.clone(), r.repo.clone()))
            .unwrap_or_default();

        let ctx = HandlerContext {
            config: self.config.current(),
            delivery_id: delivery_id.cloned(),
        };
        let Some(fut) = self.registry.handle(event, ctx) else {
            debug!(event_type, kind = %kind, "no handler registered");
            return Ok(());
        };

        let delivery = delivery_id.map(|d| d.to_string()).unwrap_or_default();
        let span = info_span!(
            "event",
            event_type,
            delivery_id = %delivery,
            org = %org,
            repo = %repo,
        );

        self.tracker.spawn(
            async move {
                match fut.await {
                    Ok(()) => info!("event handled"),
                    Err(e) => error!(error = %format!("{e:#}"), "handler failed"),
                }
            }
            .instrument(span),
        );

        Ok(())
    }
}
