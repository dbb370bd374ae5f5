//! Response relaying.
//!
//! # Responsibilities
//! - Copy backend status and JSON body to the browser untouched
//! - Synthesize `{"error": ...}` when a failing backend answers with non-JSON
//! - Turn image payloads into `image/png` responses with a cache directive
//!
//! # Design Decisions
//! - JSON bodies are relayed as the backend's bytes, not re-serialised
//! - A 2xx the endpoint cannot relay (non-JSON, empty image) is a local 500

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::de::IgnoredAny;

use crate::http::error::{ErrorEnvelope, GatewayError};
use crate::upstream::BackendResponse;

/// What goes back to the browser after a successful forward.
#[derive(Debug)]
pub enum RelayedResponse {
    /// Backend JSON, byte-for-byte.
    Json { status: StatusCode, body: Bytes },
    /// Backend answered without a body.
    Empty { status: StatusCode },
    /// Backend failed with a non-JSON body; message synthesized here.
    Envelope {
        status: StatusCode,
        envelope: ErrorEnvelope,
    },
    /// Binary image payload.
    Image { body: Bytes, cache_control: HeaderValue },
}

impl RelayedResponse {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayedResponse::Json { status, .. }
            | RelayedResponse::Empty { status }
            | RelayedResponse::Envelope { status, .. } => *status,
            RelayedResponse::Image { .. } => StatusCode::OK,
        }
    }
}

impl IntoResponse for RelayedResponse {
    fn into_response(self) -> Response {
        match self {
            RelayedResponse::Json { status, body } => (
                status,
                [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
                Body::from(body),
            )
                .into_response(),
            RelayedResponse::Empty { status } => status.into_response(),
            RelayedResponse::Envelope { status, envelope } => (status, Json(envelope)).into_response(),
            RelayedResponse::Image {
                body,
                cache_control,
            } => (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, HeaderValue::from_static("image/png")),
                    (header::CACHE_CONTROL, cache_control),
                ],
                Body::from(body),
            )
                .into_response(),
        }
    }
}

fn is_json(body: &[u8]) -> bool {
    serde_json::from_slice::<IgnoredAny>(body).is_ok()
}

fn is_blank(body: &[u8]) -> bool {
    body.iter().all(u8::is_ascii_whitespace)
}

/// Build the `{"error": ...}` body for a failing, non-JSON backend answer.
pub fn synthesize_error(status: StatusCode, body: &[u8]) -> ErrorEnvelope {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        ErrorEnvelope::new(format!("Backend returned {}", status.as_u16()))
    } else {
        ErrorEnvelope::new(text)
    }
}

/// Apply the JSON relay rules to a fully read backend answer.
pub fn relay_json_body(
    status: StatusCode,
    body: Bytes,
    message: &'static str,
) -> Result<RelayedResponse, GatewayError> {
    if is_json(&body) {
        return Ok(RelayedResponse::Json { status, body });
    }

    if status.is_success() {
        if is_blank(&body) {
            return Ok(RelayedResponse::Empty { status });
        }
        return Err(GatewayError::MalformedResponse {
            message,
            detail: format!("backend answered {status} with a non-JSON body"),
        });
    }

    Ok(RelayedResponse::Envelope {
        status,
        envelope: synthesize_error(status, &body),
    })
}

/// Relay a backend answer as JSON.
pub fn relay_json(
    response: BackendResponse,
    message: &'static str,
) -> Result<RelayedResponse, GatewayError> {
    relay_json_body(response.status, response.body, message)
}

/// Relay a backend answer as a PNG image.
///
/// Non-2xx answers fall back to the JSON relay rules.
pub fn relay_image(
    response: BackendResponse,
    message: &'static str,
    cache_control: &HeaderValue,
) -> Result<RelayedResponse, GatewayError> {
    if !response.status.is_success() {
        return relay_json(response, message);
    }

    if response.body.is_empty() {
        return Err(GatewayError::MalformedResponse {
            message,
            detail: format!("backend answered {} with an empty image", response.status),
        });
    }

    Ok(RelayedResponse::Image {
        body: response.body,
        cache_control: cache_control.clone(),
    })
}
