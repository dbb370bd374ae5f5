//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Browser request
//!     → server.rs (Axum router, request ID, trace, limits)
//!     → handlers.rs (endpoint contract)
//!     → request.rs (query/body/header extraction, 400 on bad input)
//!     → upstream::BackendClient (one outbound call)
//!     → response.rs (relay status + JSON/PNG, synthesize error bodies)
//!     → error.rs (500/400 envelope for local failures)
//!     → Send to browser
//! ```

pub mod error;
pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use error::{ErrorEnvelope, GatewayError};
pub use response::RelayedResponse;
pub use server::{AppState, HttpServer, StartupError};
