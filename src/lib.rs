//! API gateway traffic-control core.
//!
//! Resolves requests to backend routes, applies per-route policies (IP allow
//! list, bearer token, rate limit) and records request and rejection metrics.

pub mod admin;
pub mod clock;
pub mod config;
pub mod error;
pub mod filters;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod security;

pub use config::schema::GatewayConfig;
pub use error::{GatewayError, RejectReason};
pub use http::HttpServer;
pub use lifecycle::{Gateway, GatewayHandle, Shutdown};
