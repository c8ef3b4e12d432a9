//! Webhook endpoint handler.
//!
//! Deliveries arrive on two paths, told apart by `User-Agent`:
//!
//! - **Relay**: the platform's hookshot. Must carry a delivery ID and a valid
//!   HMAC signature. The event type is prefixed with [`RELAY_EVENT_PREFIX`] so
//!   the dispatcher routes it to the access handler.
//! - **Direct**: the access bot forwarding to a downstream bot. No further
//!   authentication; the event type is dispatched as-is.
//!
//! The response is returned as soon as the event is handed to the dispatcher.

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, error, warn};

use super::AppState;
use crate::types::DeliveryId;
use crate::webhooks::{RELAY_EVENT_PREFIX, SIGNATURE_PREFIX, verify_signature};

/// Header name for the event type.
pub const HEADER_EVENT: &str = "x-atomgit-event";
/// Header name for the delivery ID.
pub const HEADER_DELIVERY: &str = "x-atomgit-delivery";
/// Header name for the payload signature.
pub const HEADER_SIGNATURE: &str = "x-hub-signature-256";

/// `User-Agent` of the platform's webhook relay.
pub const RELAY_USER_AGENT: &str = "AtomGit-Hookshot";
/// `User-Agent` the access bot uses when forwarding to downstream bots.
pub const BOT_USER_AGENT: &str = "Robot-AtomGit-Access";

/// Response body for an accepted relay delivery.
pub const RELAY_ACCEPTED: &str = "The request was accepted by access's robot, inform to webhook.";

/// Largest body the endpoint will read.
const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

/// Errors that reject a delivery before dispatch.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("400 Bad Request: Missing {0} Header")]
    MissingHeader(&'static str),

    #[error("500 Internal Server Error: Failed to read request body")]
    BodyRead(#[source] axum::Error),

    #[error("403 Forbidden: Missing X-Hub-Signature-256 Header")]
    MissingSignature,

    #[error("403 Forbidden: Invalid X-Hub-Signature-256")]
    InvalidSignature,

    #[error("400 Bad Request: unknown User-Agent Header")]
    UnknownUserAgent,
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::MissingHeader(_) | WebhookError::UnknownUserAgent => {
                StatusCode::BAD_REQUEST
            }
            WebhookError::BodyRead(_) => StatusCode::INTERNAL_SERVER_ERROR,
            WebhookError::MissingSignature | WebhookError::InvalidSignature => {
                StatusCode::FORBIDDEN
            }
        };

        (status, self.to_string()).into_response()
    }
}

/// How a delivery reached the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliverySource {
    Relay,
    Direct,
}

/// An authenticated delivery, ready for dispatch.
#[derive(Debug, Clone)]
pub struct WebhookDelivery {
    /// Event type as dispatched (relay deliveries carry the prefix).
    pub event_type: String,
    pub delivery_id: Option<DeliveryId>,
    pub payload: Bytes,
    pub source: DeliverySource,
}

/// Webhook handler.
///
/// # Response
///
/// - 200 OK: delivery accepted and handed to the dispatcher
/// - 400 Bad Request: missing event or delivery header, or unknown `User-Agent`
/// - 403 Forbidden: missing, malformed or mismatched signature on the relay path
/// - 500 Internal Server Error: the body could not be read
pub async fn webhook_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<(StatusCode, &'static str), WebhookError> {
    let delivery = classify(&headers, body, app_state.webhook_secret()).await?;

    debug!(
        event_type = %delivery.event_type,
        delivery_id = ?delivery.delivery_id,
        source = ?delivery.source,
        "Received webhook"
    );

    // The delivery is authenticated; a payload the dispatcher cannot parse is
    // logged, not reported back to the sender.
    if let Err(e) = app_state.dispatcher().dispatch(
        &delivery.event_type,
        delivery.delivery_id.as_ref(),
        &delivery.payload,
    ) {
        error!(
            event_type = %delivery.event_type,
            delivery_id = ?delivery.delivery_id,
            error = %e,
            "Failed to dispatch webhook"
        );
    }

    let message = match delivery.source {
        DeliverySource::Relay => RELAY_ACCEPTED,
        DeliverySource::Direct => "",
    };
    Ok((StatusCode::OK, message))
}

/// Validates headers and signature, reading the body exactly once.
pub async fn classify(
    headers: &HeaderMap,
    body: Body,
    secret: &[u8],
) -> Result<WebhookDelivery, WebhookError> {
    let event_type =
        get_header(headers, HEADER_EVENT).ok_or(WebhookError::MissingHeader("X-AtomGit-Event"))?;

    let payload = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(WebhookError::BodyRead)?;

    match get_header(headers, "user-agent").as_deref() {
        Some(RELAY_USER_AGENT) => {
            let delivery_id = get_header(headers, HEADER_DELIVERY)
                .ok_or(WebhookError::MissingHeader("X-AtomGit-Delivery"))?;

            let signature = get_header(headers, HEADER_SIGNATURE)
                .filter(|s| s.starts_with(SIGNATURE_PREFIX))
                .ok_or(WebhookError::MissingSignature)?;

            if !verify_signature(&payload, &signature, secret) {
                warn!(delivery_id = %delivery_id, "Invalid webhook signature");
                return Err(WebhookError::InvalidSignature);
            }

            Ok(WebhookDelivery {
                event_type: format!("{RELAY_EVENT_PREFIX}{event_type}"),
                delivery_id: Some(DeliveryId::new(delivery_id)),
                payload,
                source: DeliverySource::Relay,
            })
        }
        Some(BOT_USER_AGENT) => Ok(WebhookDelivery {
            event_type,
            delivery_id: get_header(headers, HEADER_DELIVERY).map(DeliveryId::new),
            payload,
            source: DeliverySource::Direct,
        }),
        _ => Err(WebhookError::UnknownUserAgent),
    }
}

/// Extracts a header value as a string; empty values count as missing.
fn get_header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}
