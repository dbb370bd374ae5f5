//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid)
//! - Keep the request deadline above the backend timeout
//! - Check that the backend URL actually resolves
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::upstream::endpoint::resolve_backend_url;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field}: `{value}` is not a valid socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("backend.scheme must be http or https, got `{0}`")]
    UnsupportedScheme(String),

    #[error("backend.api_prefix must start with '/', got `{0}`")]
    RelativeApiPrefix(String),

    #[error("backend URL does not parse: {0}")]
    BackendUrl(String),

    #[error("timeouts.request_secs ({request}) must exceed timeouts.backend_secs ({backend})")]
    RequestDeadline { request: u64, backend: u64 },
}

/// Validate a loaded configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    let backend = &config.backend;
    if backend.scheme != "http" && backend.scheme != "https" {
        errors.push(ValidationError::UnsupportedScheme(backend.scheme.clone()));
    }
    if !backend.api_prefix.starts_with('/') {
        errors.push(ValidationError::RelativeApiPrefix(backend.api_prefix.clone()));
    }
    if backend.port == Some(0) {
        errors.push(ValidationError::Zero { field: "backend.port" });
    }
    if backend.default_port == 0 {
        errors.push(ValidationError::Zero { field: "backend.default_port" });
    }
    if let Err(e) = resolve_backend_url(backend) {
        errors.push(ValidationError::BackendUrl(e.to_string()));
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.connect_secs" });
    }
    if config.timeouts.backend_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.backend_secs" });
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.request_secs" });
    } else if config.timeouts.request_secs <= config.timeouts.backend_secs {
        errors.push(ValidationError::RequestDeadline {
            request: config.timeouts.request_secs,
            backend: config.timeouts.backend_secs,
        });
    }
    if config.limits.max_body_size == 0 {
        errors.push(ValidationError::Zero { field: "limits.max_body_size" });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
