//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every handler produces:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (request counter and latency histogram)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID (x-request-id) is attached by middleware and carried to the backend
//! - Metrics are no-ops until a recorder is installed
//! - Authorization values are never logged, only their presence

pub mod logging;
pub mod metrics;
