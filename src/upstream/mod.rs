//! Backend forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! BackendConfig
//!     → endpoint.rs (resolve base URL once at startup)
//!     → BackendBase (immutable, shared)
//!
//! Per request:
//!     handler builds target via BackendBase
//!     → client.rs (one outbound call, redirects followed)
//!     → BackendResponse (status + buffered body) handed to http::response
//! ```
//!
//! # Design Decisions
//! - No retries: each inbound request is attempted exactly once
//! - No shared mutable state; the client is cloned into every handler
//! - Outbound calls, body read included, run on their own task; a dropped
//!   inbound connection does not abort them

pub mod client;
pub mod endpoint;

pub use client::{BackendClient, BackendResponse, BodyKind, ForwardRequest, UpstreamError, X_REQUEST_ID};
pub use endpoint::{resolve_backend_url, BackendBase, TargetError};
