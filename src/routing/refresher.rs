//! Route table refresh.
//!
//! # Responsibilities
//! - Fetch the route set from the source and build a new table
//! - Publish the table with a single atomic swap
//! - Run on a fixed interval and on demand
//!
//! # Design Decisions
//! - Fail static: a failed fetch keeps the last good table
//! - Reloads are serialized so a slow fetch cannot overwrite a newer one
//! - On-demand triggers are coalesced (`Notify` holds at most one permit)

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, Notify};
use tokio::time;

use crate::error::GatewayError;
use crate::observability::metrics;
use crate::routing::router::RouteTable;
use crate::routing::source::RouteSource;

/// The live route table shared by every request task.
pub type SharedRouteTable = Arc<ArcSwap<RouteTable>>;

/// Handle used to request an out-of-schedule reload.
#[derive(Debug, Clone, Default)]
pub struct RefreshTrigger {
    notify: Arc<Notify>,
}

impl RefreshTrigger {
    pub fn trigger(&self) {
        self.notify.notify_one();
    }

    async fn notified(&self) {
        self.notify.notified().await;
    }
}

/// Refresh outcome counters, exposed through the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshStatus {
    pub source: String,
    pub populated: bool,
    pub generation: u64,
    pub route_count: usize,
    pub skipped_count: usize,
    pub successes: u64,
    pub failures: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Rebuilds the route table from a route source.
pub struct Refresher {
    source: Arc<dyn RouteSource>,
    table: SharedRouteTable,
    trigger: RefreshTrigger,
    reload_lock: tokio::sync::Mutex<()>,
    populated: AtomicBool,
    generation: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    last_success: Mutex<Option<DateTime<Utc>>>,
    last_error: Mutex<Option<String>>,
}

impl Refresher {
    /// Create a refresher publishing into a fresh, empty table.
    pub fn new(source: Arc<dyn RouteSource>) -> Self {
        Self {
            source,
            table: Arc::new(ArcSwap::from_pointee(RouteTable::empty())),
            trigger: RefreshTrigger::default(),
            reload_lock: tokio::sync::Mutex::new(()),
            populated: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            last_success: Mutex::new(None),
            last_error: Mutex::new(None),
        }
    }

    /// The live table reference. Readers call `.load()` per request.
    pub fn table(&self) -> SharedRouteTable {
        self.table.clone()
    }

    pub fn trigger(&self) -> RefreshTrigger {
        self.trigger.clone()
    }

    /// Whether any reload has ever succeeded.
    pub fn has_populated(&self) -> bool {
        self.populated.load(Ordering::Acquire)
    }

    /// Fetch, build and publish a new table.
    ///
    /// On failure the current table stays in place and the error is returned
    /// to the caller (scheduled runs only log it).
    pub async fn reload(&self) -> Result<Arc<RouteTable>, GatewayError> {
        let _guard = self.reload_lock.lock().await;

        let specs = match self.source.fetch().await {
            Ok(specs) => specs,
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) =
                    Some(e.to_string());
                metrics::record_refresh(false, self.table.load().len());
                tracing::error!(
                    source = %self.source.describe(),
                    error = %e,
                    "Route refresh failed, keeping current table"
                );
                return Err(GatewayError::SourceFetch(e));
            }
        };

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let table = Arc::new(RouteTable::build(specs).with_generation(generation));
        self.table.store(table.clone());
        self.populated.store(true, Ordering::Release);

        self.successes.fetch_add(1, Ordering::Relaxed);
        *self.last_success.lock().unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = None;
        metrics::record_refresh(true, table.len());

        tracing::info!(
            source = %self.source.describe(),
            generation,
            routes = table.len(),
            skipped = table.skipped().len(),
            "Route table refreshed"
        );

        Ok(table)
    }

    pub fn status(&self) -> RefreshStatus {
        let table = self.table.load();
        RefreshStatus {
            source: self.source.describe(),
            populated: self.has_populated(),
            generation: table.generation(),
            route_count: table.len(),
            skipped_count: table.skipped().len(),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            last_success: *self.last_success.lock().unwrap_or_else(PoisonError::into_inner),
            last_error: self
                .last_error
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }

    /// Reload on every tick of `interval` and whenever triggered, until
    /// shutdown. The first tick fires one interval after the call; the
    /// initial load is the caller's job.
    pub async fn run(self: Arc<Self>, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            source = %self.source.describe(),
            interval_secs = interval.as_secs(),
            "Route refresher starting"
        );

        let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let _ = self.reload().await;
                }
                _ = self.trigger.notified() => {
                    tracing::info!("On-demand route refresh requested");
                    let _ = self.reload().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Route refresher received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
