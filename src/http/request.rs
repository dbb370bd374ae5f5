//! Inbound request extraction.
//!
//! # Responsibilities
//! - Decode query parameters into typed structs
//! - Reject missing or blank required parameters with 400
//! - Validate JSON bodies without re-serialising them
//! - Pick out the headers that travel to the backend
//!
//! # Design Decisions
//! - `Authorization` is copied only if present; nothing is ever defaulted
//! - Bodies are forwarded as the inbound bytes once they parse as JSON

use axum::body::Bytes;
use axum::extract::{
    rejection::{BytesRejection, QueryRejection},
    Query,
};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use serde::de::IgnoredAny;
use serde::Deserialize;

use crate::http::error::GatewayError;
use crate::upstream::X_REQUEST_ID;

/// Query of the generic proxy endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProxyParams {
    pub path: Option<String>,
}

impl ProxyParams {
    pub fn path(&self) -> Result<&str, GatewayError> {
        self.path
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or(GatewayError::MissingParameter("Missing path parameter"))
    }
}

/// Query of the card and QR endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CardParams {
    pub company_slug: Option<String>,
    pub employee_slug: Option<String>,
}

impl CardParams {
    /// Both identifiers as sent, or 400 if either is absent or blank.
    pub fn slugs(&self) -> Result<(&str, &str), GatewayError> {
        match (non_blank(&self.company_slug), non_blank(&self.employee_slug)) {
            (Some(company), Some(employee)) => Ok((company, employee)),
            _ => Err(GatewayError::MissingParameter("Missing parameters")),
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

/// Unwrap a query extraction, mapping malformed query strings to 400.
pub fn query<T>(extracted: Result<Query<T>, QueryRejection>) -> Result<T, GatewayError> {
    extracted
        .map(|Query(params)| params)
        .map_err(|rejection| GatewayError::InvalidQuery(rejection.body_text()))
}

/// Unwrap a buffered body, mapping the size limit to 413 and anything else to 400.
pub fn raw_body(extracted: Result<Bytes, BytesRejection>) -> Result<Bytes, GatewayError> {
    extracted.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            GatewayError::BodyTooLarge(rejection.body_text())
        } else {
            GatewayError::InvalidBody(rejection.body_text())
        }
    })
}

/// The inbound `Authorization` header, byte-for-byte.
pub fn authorization(headers: &HeaderMap) -> Option<HeaderValue> {
    headers.get(header::AUTHORIZATION).cloned()
}

/// The request ID assigned (or accepted) by the request-id layer.
pub fn request_id(headers: &HeaderMap) -> Option<HeaderValue> {
    headers.get(X_REQUEST_ID).cloned()
}

/// Validate an inbound JSON body.
///
/// Blank bodies yield `None` unless `required`, in which case they are an error.
pub fn json_body(body: Bytes, required: bool) -> Result<Option<Bytes>, GatewayError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return if required {
            Err(GatewayError::InvalidBody("request body is empty".into()))
        } else {
            Ok(None)
        };
    }

    serde_json::from_slice::<IgnoredAny>(&body)
        .map_err(|e| GatewayError::InvalidBody(e.to_string()))?;
    Ok(Some(body))
}
