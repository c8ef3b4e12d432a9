use std::sync::Arc;

use anyhow::anyhow;
use tracing::{debug, info, instrument, warn};

use super::config::Configuration;
use super::forwarder::Forwarder;
use crate::errors::MultiError;
use crate::framework::{HandlerRegistry, RegistryError, Robot};
use crate::webhooks::AccessEvent;

/// Relays verified deliveries to the downstream bots configured for the
/// delivery's repository.
pub struct AccessBot {
    forwarder: Forwarder,
}

impl AccessBot {
    pub fn new(forwarder: Forwarder) -> Self {
        Self { forwarder }
    }

    #[instrument(skip_all, fields(event_type = %event.event_type, repo = ?event.repo))]
    pub async fn handle_access(&self, event: AccessEvent, config: &Configuration) -> anyhow::Result<()> {
        let Some(repo) = &event.repo else {
            debug!("delivery names no repository");
            return Ok(());
        };
        let endpoints = config
            .access
            .endpoints(&repo.org, &repo.repo, &event.event_type);
        if endpoints.is_empty() {
            debug!("no downstream bot wants this event");
            return Ok(());
        }

        let failures = self
            .forwarder
            .forward_all(&endpoints, &event.event_type, &event.payload)
            .await;
        info!(
            endpoints = endpoints.len(),
            failed = failures.len(),
            "forwarded delivery"
        );

        let mut errors = MultiError::new();
        for (endpoint, e) in failures {
            warn!(endpoint, error = %e, "error forwarding event");
            errors.push(anyhow!(e).context(format!("forward to {endpoint}")));
        }
        errors.into_result()
    }
}

impl Robot for AccessBot {
    type Config = Configuration;

    fn name(&self) -> &'static str {
        "access"
    }

    fn register(self: Arc<Self>, registry: &mut HandlerRegistry<Configuration>) -> Result<(), RegistryError> {
        registry.on_access(move |event, ctx| {
            let bot = Arc::clone(&self);
            async move { bot.handle_access(event, &ctx.config).await }
        })
    }
}
