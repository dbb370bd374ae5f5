//! Gateway error type and its JSON envelope.
//!
//! Only validation (400), transport limits (408, 413) and infrastructure
//! (500) failures live here.
//! Backend-reported errors are not gateway errors; they are relayed as-is by
//! `http::response`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::upstream::{TargetError, UpstreamError};

/// The `{"error": ...}` body every locally generated failure carries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorEnvelope {
    pub error: String,
}

impl ErrorEnvelope {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Per-request failure. `Display` is the client-facing message.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A required query parameter is absent or blank.
    #[error("{0}")]
    MissingParameter(&'static str),

    #[error("Invalid query string")]
    InvalidQuery(String),

    #[error("Invalid JSON body")]
    InvalidBody(String),

    #[error("Invalid path parameter")]
    InvalidPath(#[source] TargetError),

    #[error("Request body too large")]
    BodyTooLarge(String),

    /// The inbound request outlived `timeouts.request_secs`.
    #[error("Request timed out")]
    RequestTimeout,

    /// The backend could not be reached or did not answer in time.
    #[error("{message}")]
    Upstream {
        message: &'static str,
        #[source]
        source: UpstreamError,
    },

    /// The backend answered, but not with what the endpoint relays.
    #[error("{message}")]
    MalformedResponse {
        message: &'static str,
        detail: String,
    },

    /// A fixed backend route could not be built.
    #[error("{message}")]
    Target {
        message: &'static str,
        #[source]
        source: TargetError,
    },
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::MissingParameter(_)
            | GatewayError::InvalidQuery(_)
            | GatewayError::InvalidBody(_)
            | GatewayError::InvalidPath(_) => StatusCode::BAD_REQUEST,
            GatewayError::BodyTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            GatewayError::Upstream { .. }
            | GatewayError::MalformedResponse { .. }
            | GatewayError::Target { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Operator-facing detail; never sent to the browser.
    pub fn detail(&self) -> String {
        match self {
            GatewayError::MissingParameter(message) => message.to_string(),
            GatewayError::InvalidQuery(detail)
            | GatewayError::InvalidBody(detail)
            | GatewayError::BodyTooLarge(detail)
            | GatewayError::MalformedResponse { detail, .. } => detail.clone(),
            GatewayError::InvalidPath(source) | GatewayError::Target { source, .. } => {
                source.to_string()
            }
            GatewayError::Upstream { source, .. } => source.to_string(),
            GatewayError::RequestTimeout => "request deadline elapsed".to_string(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorEnvelope::new(self.to_string()))).into_response()
    }
}
