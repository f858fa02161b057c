//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route refresh (every interval, on demand, on route file change):
//!     source.rs (fetch full RouteSpec set)
//!     → router.rs (validate, skip bad specs, sort by prefix length)
//!     → refresher.rs (atomic swap of Arc<RouteTable>)
//!
//! Incoming request (path)
//!     → router.rs (scan table in order)
//!     → matcher.rs (canonical prefix test)
//!     → Return: matched Route or None
//! ```
//!
//! # Design Decisions
//! - Tables are immutable; a reload builds a new one and swaps it in
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same table and path always match the same route
//! - First match wins (ordered by prefix length, then fetch order)

pub mod matcher;
pub mod refresher;
pub mod route;
pub mod router;
pub mod source;
pub mod watcher;

pub use matcher::{canonical_prefix, PathPrefixMatcher};
pub use refresher::{RefreshStatus, RefreshTrigger, Refresher, SharedRouteTable};
pub use route::{RateLimitSpec, Route, RouteError, RouteFlags, RouteSpec};
pub use router::RouteTable;
pub use source::{
    FileRouteSource, HttpRouteSource, RouteSource, RouteSourceError, StaticRouteSource,
};
pub use watcher::RouteFileWatcher;
