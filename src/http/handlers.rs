//! Endpoint handlers.
//!
//! Each handler only declares its contract (backend route, method, whether a
//! body or Authorization travels, JSON or image relay). The forward/relay
//! work is shared in [`forward`].

use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{
        rejection::{BytesRejection, QueryRejection},
        Query, State,
    },
    http::{HeaderMap, Method},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::http::error::GatewayError;
use crate::http::request::{self, CardParams, ProxyParams};
use crate::http::response::{relay_image, relay_json, RelayedResponse};
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::upstream::ForwardRequest;

/// Static description of one browser-facing endpoint.
#[derive(Debug, Clone, Copy)]
pub struct Endpoint {
    /// Label for logs and metrics.
    pub name: &'static str,
    /// Message returned with a 500 when the backend cannot be reached.
    pub failure: &'static str,
}

pub const LOGIN: Endpoint = Endpoint {
    name: "auth_login",
    failure: "Failed to login",
};

pub const SIGNUP: Endpoint = Endpoint {
    name: "auth_signup",
    failure: "Failed to sign up",
};

pub const CARD: Endpoint = Endpoint {
    name: "card",
    failure: "Failed to fetch card data",
};

pub const QR_CODE: Endpoint = Endpoint {
    name: "qrcode",
    failure: "Failed to fetch QR code",
};

pub const PROXY: Endpoint = Endpoint {
    name: "proxy",
    failure: "Failed to process request",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relay {
    Json,
    Image,
}

/// Send one request to the backend and relay the answer.
async fn forward(
    state: &AppState,
    endpoint: &Endpoint,
    relay: Relay,
    request: ForwardRequest,
) -> Result<RelayedResponse, GatewayError> {
    let method = request.method.clone();
    let url = request.url.to_string();

    let response = state
        .backend
        .send(request)
        .await
        .map_err(|source| GatewayError::Upstream {
            message: endpoint.failure,
            source,
        })?;

    tracing::debug!(
        endpoint = endpoint.name,
        method = %method,
        url = %url,
        status = %response.status,
        bytes = response.body.len(),
        "Backend responded"
    );

    match relay {
        Relay::Json => relay_json(response, endpoint.failure),
        Relay::Image => relay_image(response, endpoint.failure, &state.qr_cache_control),
    }
}

/// Record metrics, log local failures, and render the outcome.
fn complete(
    endpoint: &Endpoint,
    start: Instant,
    result: Result<RelayedResponse, GatewayError>,
) -> Response {
    let status = match &result {
        Ok(relayed) => relayed.status(),
        Err(e) => e.status(),
    };
    metrics::record_request(endpoint.name, status, start);

    if let Err(e) = &result {
        if status.is_server_error() {
            tracing::error!(
                endpoint = endpoint.name,
                error = %e,
                detail = %e.detail(),
                "Backend request failed"
            );
        } else {
            tracing::warn!(
                endpoint = endpoint.name,
                error = %e,
                detail = %e.detail(),
                "Rejected request"
            );
        }
    }

    match result {
        Ok(relayed) => relayed.into_response(),
        Err(e) => e.into_response(),
    }
}

async fn forward_credentials(
    state: &AppState,
    endpoint: &Endpoint,
    route: &[&str],
    headers: &HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<RelayedResponse, GatewayError> {
    let body = request::json_body(request::raw_body(body)?, true)?;
    let url = state
        .backend
        .base()
        .join_segments(route)
        .map_err(|source| GatewayError::Target {
            message: endpoint.failure,
            source,
        })?;

    let request = ForwardRequest::json(Method::POST, url)
        .with_request_id(request::request_id(headers))
        .with_body(body);
    forward(state, endpoint, Relay::Json, request).await
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let start = Instant::now();
    let result = forward_credentials(&state, &LOGIN, &["auth", "login"], &headers, body).await;
    complete(&LOGIN, start, result)
}

/// POST /api/auth/signup
pub async fn signup(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let start = Instant::now();
    let result = forward_credentials(&state, &SIGNUP, &["auth", "signup"], &headers, body).await;
    complete(&SIGNUP, start, result)
}

async fn fetch_card(
    state: &AppState,
    endpoint: &Endpoint,
    relay: Relay,
    params: Result<Query<CardParams>, QueryRejection>,
    headers: &HeaderMap,
) -> Result<RelayedResponse, GatewayError> {
    let params = request::query(params)?;
    let (company, employee) = params.slugs()?;

    let segments = ["card", company, employee, "qr-vcard"];
    let route = match relay {
        Relay::Json => &segments[..3],
        Relay::Image => &segments[..],
    };
    let url = state
        .backend
        .base()
        .join_segments(route)
        .map_err(|source| GatewayError::Target {
            message: endpoint.failure,
            source,
        })?;

    let request = match relay {
        Relay::Json => ForwardRequest::json(Method::GET, url),
        Relay::Image => ForwardRequest::binary(url),
    }
    .with_request_id(request::request_id(headers));
    forward(state, endpoint, relay, request).await
}

/// GET /api/card?company_slug=..&employee_slug=..
pub async fn card(
    State(state): State<AppState>,
    params: Result<Query<CardParams>, QueryRejection>,
    headers: HeaderMap,
) -> Response {
    let start = Instant::now();
    let result = fetch_card(&state, &CARD, Relay::Json, params, &headers).await;
    complete(&CARD, start, result)
}

/// GET /api/qrcode?company_slug=..&employee_slug=..
pub async fn qrcode(
    State(state): State<AppState>,
    params: Result<Query<CardParams>, QueryRejection>,
    headers: HeaderMap,
) -> Response {
    let start = Instant::now();
    let result = fetch_card(&state, &QR_CODE, Relay::Image, params, &headers).await;
    complete(&QR_CODE, start, result)
}

async fn forward_path(
    state: &AppState,
    method: Method,
    params: Result<Query<ProxyParams>, QueryRejection>,
    headers: &HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<RelayedResponse, GatewayError> {
    let params = request::query(params)?;
    let path = params.path()?;
    let body = request::raw_body(body)?;
    let url = state
        .backend
        .base()
        .join_raw_path(path)
        .map_err(GatewayError::InvalidPath)?;

    let body = if method == Method::POST || method == Method::PUT {
        request::json_body(body, false)?
    } else {
        None
    };

    let authorization = request::authorization(headers);
    tracing::debug!(
        method = %method,
        path = %path,
        auth = authorization.is_some(),
        "Proxying request"
    );

    let request = ForwardRequest::json(method, url)
        .with_authorization(authorization)
        .with_request_id(request::request_id(headers))
        .with_body(body);
    forward(state, &PROXY, Relay::Json, request).await
}

/// GET/POST/PUT/DELETE /api/proxy?path=/backend/resource
pub async fn proxy(
    State(state): State<AppState>,
    method: Method,
    params: Result<Query<ProxyParams>, QueryRejection>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let start = Instant::now();
    let result = forward_path(&state, method, params, &headers, body).await;
    complete(&PROXY, start, result)
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
}

/// GET /healthz
pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "operational",
        version: env!("CARGO_PKG_VERSION"),
    })
}
