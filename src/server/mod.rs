//! HTTP server shared by every bot.
//!
//! # Endpoints
//!
//! - `POST /atomgit-hook` - Accepts webhook deliveries (returns 200 once dispatched)
//! - `GET /` - Health check, empty 200

use std::sync::Arc;

pub mod health;
pub mod webhook;

pub use health::health_handler;
pub use webhook::{DeliverySource, WebhookDelivery, WebhookError, webhook_handler};

use crate::framework::Dispatch;

/// Shared application state.
///
/// This is passed to all handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Secret for verifying relay signatures.
    webhook_secret: Vec<u8>,

    dispatcher: Arc<dyn Dispatch>,
}

impl AppState {
    pub fn new(webhook_secret: impl Into<Vec<u8>>, dispatcher: Arc<dyn Dispatch>) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                webhook_secret: webhook_secret.into(),
                dispatcher,
            }),
        }
    }

    pub fn webhook_secret(&self) -> &[u8] {
        &self.inner.webhook_secret
    }

    pub fn dispatcher(&self) -> &dyn Dispatch {
        self.inner.dispatcher.as_ref()
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/atomgit-hook", post(webhook_handler))
        .route("/", get(health_handler))
        .with_state(app_state)
}
