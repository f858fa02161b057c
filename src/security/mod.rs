//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → client_ip.rs (resolve client address from proxy headers / peer)
//!     → token.rs (verify bearer token, local JWT or remote introspection)
//!     → rate_limit.rs (per client + route fixed window)
//! ```
//!
//! # Design Decisions
//! - Fail closed: a verifier error or timeout rejects the request
//! - No trust in client input

pub mod client_ip;
pub mod rate_limit;
pub mod token;

pub use client_ip::{normalize_ip, ClientIpResolver, UNKNOWN_CLIENT};
pub use rate_limit::{RateDecision, RateLimitKey, RateLimitWindow, RateLimiter};
pub use token::{AuthError, JwtVerifier, IntrospectionVerifier, TokenVerifier, VerifiedToken};
