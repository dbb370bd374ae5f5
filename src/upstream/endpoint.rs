//! Backend URL resolution and target building.
//!
//! # Responsibilities
//! - Pick scheme/host/port for the backend from a `BackendConfig`
//! - Build per-endpoint target URLs under the API prefix
//! - Keep raw proxy paths from escaping the API prefix
//!
//! # Design Decisions
//! - Resolution is a pure function of its input; no environment access here
//! - Fixed routes go through `path_segments_mut` so identifiers are percent-encoded
//! - Raw proxy paths are appended verbatim, then checked after URL normalisation

use thiserror::Error;
use url::{ParseError, Url};

use crate::config::BackendConfig;

/// Resolve the backend base URL (`<scheme>://<host>:<port><api_prefix>`).
///
/// Host precedence: explicit `host` > `internal_host` when `docker` is set >
/// `default_host`. Port precedence: explicit `port` > `default_port`.
pub fn resolve_backend_url(config: &BackendConfig) -> Result<Url, ParseError> {
    let host = match &config.host {
        Some(host) => host.as_str(),
        None if config.docker => config.internal_host.as_str(),
        None => config.default_host.as_str(),
    };
    let port = config.port.unwrap_or(config.default_port);

    Url::parse(&format!(
        "{}://{}:{}{}",
        config.scheme, host, port, config.api_prefix
    ))
}

/// Errors produced while building a target URL.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("path must start with '/'")]
    NotAbsolute,

    #[error("path resolves outside the API prefix")]
    OutsidePrefix,

    #[error("target URL does not parse: {0}")]
    Parse(#[from] ParseError),

    #[error("backend URL cannot carry path segments")]
    CannotBeABase,
}

/// Resolved backend base URL, including the API prefix.
#[derive(Debug, Clone)]
pub struct BackendBase {
    url: Url,
}

impl BackendBase {
    /// Resolve the base from configuration.
    pub fn from_config(config: &BackendConfig) -> Result<Self, TargetError> {
        let url = resolve_backend_url(config)?;
        if url.cannot_be_a_base() {
            return Err(TargetError::CannotBeABase);
        }
        Ok(Self { url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Append path segments to the base, percent-encoding each one.
    pub fn join_segments(&self, segments: &[&str]) -> Result<Url, TargetError> {
        let mut url = self.url.clone();
        url.path_segments_mut()
            .map_err(|_| TargetError::CannotBeABase)?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Append a raw path (which may carry a query string) to the base.
    pub fn join_raw_path(&self, path: &str) -> Result<Url, TargetError> {
        if !path.starts_with('/') {
            return Err(TargetError::NotAbsolute);
        }

        let base = self.url.as_str().trim_end_matches('/');
        let url = Url::parse(&format!("{base}{path}"))?;

        let prefix = self.url.path().trim_end_matches('/');
        let within = url.path() == prefix
            || url
                .path()
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'));
        if url.host_str() != self.url.host_str() || url.port() != self.url.port() || !within {
            return Err(TargetError::OutsidePrefix);
        }

        Ok(url)
    }
}
