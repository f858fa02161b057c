//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validate config → collector, limiter, verifier, route source
//!     → first route load → background tasks → listeners
//!
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → tasks and servers drain → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - Shutdown has a grace period, after which remaining tasks are abandoned

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
pub use startup::{Gateway, GatewayHandle, StartupError};
