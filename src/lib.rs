//! Card gateway library.
//!
//! Browser-facing proxy in front of the digital-business-card backend API:
//! auth forwarding, card and QR lookups, and a generic path proxy.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod upstream;

pub use config::schema::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
