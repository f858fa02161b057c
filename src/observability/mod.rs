//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request path and background tasks produce:
//!     → logging.rs (structured log events)
//!     → collector.rs (in-process counters, buckets, samples)
//!         → metrics.rs (mirrored into Prometheus)
//!
//! Consumers:
//!     → admin API (collector snapshots, timeseries.rs aggregation)
//!     → Prometheus scrape endpoint
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through request spans
//! - Metric writes are atomic increments

pub mod collector;
pub mod logging;
pub mod metrics;
pub mod timeseries;

pub use collector::{
    MetricsCollector, MetricsSummary, MinutePoint, RouteSnapshot, WindowCounts, UNMATCHED_ROUTE,
};
pub use timeseries::{TimePoint, TimeRange, TimeSeries};
