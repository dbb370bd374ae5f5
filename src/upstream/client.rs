//! Single-shot backend client.
//!
//! Every inbound request becomes at most one outbound request. Redirects are
//! followed transparently (the QR endpoint relies on this) up to the
//! configured limit; timeouts come from `TimeoutConfig`. The exchange,
//! response body included, completes even if the browser goes away.

use std::time::Duration;

use axum::body::Bytes;
use axum::http::{header, HeaderValue, Method, StatusCode};
use reqwest::redirect::Policy;
use thiserror::Error;
use url::Url;

use crate::config::TimeoutConfig;
use crate::upstream::endpoint::BackendBase;

/// Header carrying the gateway request ID to the backend.
pub const X_REQUEST_ID: &str = "x-request-id";

/// How the outbound body should be labelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// Send `Content-Type: application/json`.
    Json,
    /// Send no content type (image fetches).
    None,
}

/// One request to be forwarded to the backend.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub method: Method,
    pub url: Url,
    pub kind: BodyKind,
    /// Copied verbatim from the inbound request, never synthesised.
    pub authorization: Option<HeaderValue>,
    pub request_id: Option<HeaderValue>,
    pub body: Option<Bytes>,
}

impl ForwardRequest {
    /// A JSON-labelled request with no auth and no body.
    pub fn json(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            kind: BodyKind::Json,
            authorization: None,
            request_id: None,
            body: None,
        }
    }

    /// A plain GET for binary payloads.
    pub fn binary(url: Url) -> Self {
        Self {
            kind: BodyKind::None,
            ..Self::json(Method::GET, url)
        }
    }

    pub fn with_authorization(mut self, value: Option<HeaderValue>) -> Self {
        self.authorization = value;
        self
    }

    pub fn with_request_id(mut self, value: Option<HeaderValue>) -> Self {
        self.request_id = value;
        self
    }

    pub fn with_body(mut self, body: Option<Bytes>) -> Self {
        self.body = body;
        self
    }
}

/// A backend answer, fully read.
#[derive(Debug, Clone)]
pub struct BackendResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

/// Failure to obtain a response from the backend.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Connection refused, DNS failure, timeout, too many redirects.
    #[error("backend transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The detached send task panicked or was cancelled.
    #[error("backend send task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// HTTP client bound to one backend base URL.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base: BackendBase,
}

impl BackendClient {
    /// Build the client. Called once at startup; the connection pool is shared
    /// by every handler.
    pub fn new(
        base: BackendBase,
        timeouts: &TimeoutConfig,
        max_redirects: usize,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .timeout(Duration::from_secs(timeouts.backend_secs))
            .redirect(Policy::limited(max_redirects))
            .no_proxy()
            .build()?;

        Ok(Self { http, base })
    }

    pub fn base(&self) -> &BackendBase {
        &self.base
    }

    /// Send `request` exactly once and buffer the answer.
    ///
    /// Sending and reading run on their own task, so a client that hangs up
    /// does not abort an exchange the backend may already be processing.
    pub async fn send(&self, request: ForwardRequest) -> Result<BackendResponse, UpstreamError> {
        let mut builder = self.http.request(request.method, request.url);

        if request.kind == BodyKind::Json {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
        }
        if let Some(auth) = request.authorization {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        if let Some(id) = request.request_id {
            builder = builder.header(X_REQUEST_ID, id);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let exchange = async move {
            let response = builder.send().await?;
            let status = response.status();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>(BackendResponse { status, body })
        };

        let response = tokio::spawn(exchange).await??;
        Ok(response)
    }
}
