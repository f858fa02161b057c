//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared by value/Arc with all subsystems at startup
//! ```
//!
//! Route definitions are not part of the reloadable config: they come from a
//! `RouteSource` and are refreshed by the routing subsystem.
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, AuthConfig, AuthMode, ClientIpConfig, GatewayConfig, ListenerConfig,
    MetricsConfig, ObservabilityConfig, RateLimitConfig, RefreshConfig, RouteSourceConfig,
    RouteSourceKind, TimeoutConfig,
};
