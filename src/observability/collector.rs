//! In-process request and rejection metrics.
//!
//! # Responsibilities
//! - Count requests and rejections in total, per route and per time bucket
//! - Keep rejection reason counts and bounded response-time samples
//! - Serve owned snapshots to the admin API
//! - Evict expired buckets in the background
//!
//! # Design Decisions
//! - Writes are atomic increments on entries of sharded maps; a bucket is
//!   created on first use only
//! - Reads copy what they need; no reader holds a lock across a write path
//! - Time comes from a [`Clock`] so bucket boundaries are testable
//! - Every write is mirrored into the Prometheus facade

use std::collections::{BTreeMap, VecDeque};
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time;

use crate::clock::Clock;
use crate::config::MetricsConfig;
use crate::error::RejectReason;
use crate::observability::metrics;
use crate::observability::timeseries::{SeriesBuilder, TimeRange, TimeSeries, MINUTE_MS};

/// Route id under which unroutable requests are recorded.
pub const UNMATCHED_ROUTE: &str = "_unmatched";

#[derive(Debug, Default)]
struct Bucket {
    requests: AtomicU64,
    rejections: AtomicU64,
}

impl Bucket {
    fn counts(&self) -> (u64, u64) {
        (
            self.requests.load(Ordering::Relaxed),
            self.rejections.load(Ordering::Relaxed),
        )
    }
}

#[derive(Debug, Default)]
struct RouteStats {
    requests: AtomicU64,
    rejections: AtomicU64,
    samples: Mutex<VecDeque<u64>>,
}

type BucketKey = (u64, String);

/// Request and rejection counts for a span of time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WindowCounts {
    pub requests: u64,
    pub rejections: u64,
}

/// Gateway-wide totals.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub total_requests: u64,
    pub total_rejections: u64,
    pub current_minute: WindowCounts,
    pub previous_minute: WindowCounts,
    pub tracked_routes: usize,
    pub timestamp: DateTime<Utc>,
}

/// Counts for one minute of a route's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MinutePoint {
    pub timestamp: DateTime<Utc>,
    pub requests: u64,
    pub rejections: u64,
}

/// Per-route view.
#[derive(Debug, Clone, Serialize)]
pub struct RouteSnapshot {
    pub route_id: String,
    pub requests: u64,
    pub rejections: u64,
    pub avg_response_ms: f64,
    pub samples: usize,
    pub history: Vec<MinutePoint>,
}

/// Concurrent metrics store.
#[derive(Debug)]
pub struct MetricsCollector {
    clock: Arc<dyn Clock>,
    config: MetricsConfig,
    total_requests: AtomicU64,
    total_rejections: AtomicU64,
    seconds: DashMap<BucketKey, Bucket>,
    minutes: DashMap<BucketKey, Bucket>,
    routes: DashMap<String, RouteStats>,
    reasons: DashMap<RejectReason, AtomicU64>,
}

/// Run `f` on the value for `key`, inserting a default value first if needed.
fn with_entry<K, V, R>(map: &DashMap<K, V>, key: K, f: impl FnOnce(&V) -> R) -> R
where
    K: Eq + Hash,
    V: Default,
{
    if let Some(value) = map.get(&key) {
        return f(&value);
    }
    let value = map.entry(key).or_default().downgrade();
    f(&value)
}

impl MetricsCollector {
    pub fn new(clock: Arc<dyn Clock>, config: MetricsConfig) -> Self {
        Self {
            clock,
            config,
            total_requests: AtomicU64::new(0),
            total_rejections: AtomicU64::new(0),
            seconds: DashMap::new(),
            minutes: DashMap::new(),
            routes: DashMap::new(),
            reasons: DashMap::new(),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Count one request for `route_id`.
    pub fn record_request(&self, route_id: &str) {
        let now = self.clock.now_millis();
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.bump_buckets(route_id, now, |b| &b.requests);
        with_entry(&self.routes, route_id.to_string(), |stats| {
            stats.requests.fetch_add(1, Ordering::Relaxed);
        });
        metrics::record_request(route_id);
    }

    /// Count one rejection for `route_id` with its reason tag.
    pub fn record_rejection(&self, route_id: &str, reason: RejectReason) {
        let now = self.clock.now_millis();
        self.total_rejections.fetch_add(1, Ordering::Relaxed);
        self.bump_buckets(route_id, now, |b| &b.rejections);
        with_entry(&self.routes, route_id.to_string(), |stats| {
            stats.rejections.fetch_add(1, Ordering::Relaxed);
        });
        with_entry(&self.reasons, reason, |count| {
            count.fetch_add(1, Ordering::Relaxed);
        });
        metrics::record_rejection(route_id, reason);
    }

    /// Keep a response-time sample; the oldest sample is dropped at capacity.
    pub fn record_response_time(&self, route_id: &str, elapsed: Duration) {
        let ms = elapsed.as_millis() as u64;
        let cap = self.config.response_time_samples;
        with_entry(&self.routes, route_id.to_string(), |stats| {
            let mut samples = stats.samples.lock().unwrap_or_else(PoisonError::into_inner);
            samples.push_back(ms);
            while samples.len() > cap {
                samples.pop_front();
            }
        });
        metrics::record_response_time(route_id, elapsed);
    }

    fn bump_buckets(&self, route_id: &str, now_ms: u64, field: fn(&Bucket) -> &AtomicU64) {
        let second = now_ms / 1000;
        let minute = now_ms / MINUTE_MS;
        with_entry(&self.seconds, (second, route_id.to_string()), |b| {
            field(b).fetch_add(1, Ordering::Relaxed);
        });
        with_entry(&self.minutes, (minute, route_id.to_string()), |b| {
            field(b).fetch_add(1, Ordering::Relaxed);
        });
    }

    pub fn summary(&self) -> MetricsSummary {
        let now = self.clock.now_millis();
        let current = now / MINUTE_MS;
        let previous = current.saturating_sub(1);

        let mut current_minute = WindowCounts::default();
        let mut previous_minute = WindowCounts::default();
        for entry in self.seconds.iter() {
            let minute = entry.key().0 / 60;
            let (requests, rejections) = entry.value().counts();
            let slot = if minute == current {
                &mut current_minute
            } else if minute == previous && previous != current {
                &mut previous_minute
            } else {
                continue;
            };
            slot.requests += requests;
            slot.rejections += rejections;
        }

        MetricsSummary {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            total_rejections: self.total_rejections.load(Ordering::Relaxed),
            current_minute,
            previous_minute,
            tracked_routes: self.routes.len(),
            timestamp: millis_to_datetime(now),
        }
    }

    /// Per-route counts, average latency and recent minute history,
    /// ordered by route id.
    pub fn route_snapshots(&self) -> Vec<RouteSnapshot> {
        let now_minute = self.clock.now_millis() / MINUTE_MS;
        let history_len = self.config.history_minutes.max(1);
        let first_minute = now_minute.saturating_sub(history_len - 1);

        let mut snapshots: Vec<RouteSnapshot> = self
            .routes
            .iter()
            .map(|entry| {
                let stats = entry.value();
                let (avg_response_ms, samples) = {
                    let samples = stats.samples.lock().unwrap_or_else(PoisonError::into_inner);
                    let sum: u64 = samples.iter().sum();
                    let avg = if samples.is_empty() {
                        0.0
                    } else {
                        sum as f64 / samples.len() as f64
                    };
                    (avg, samples.len())
                };
                RouteSnapshot {
                    route_id: entry.key().clone(),
                    requests: stats.requests.load(Ordering::Relaxed),
                    rejections: stats.rejections.load(Ordering::Relaxed),
                    avg_response_ms,
                    samples,
                    history: Vec::new(),
                }
            })
            .collect();

        for snapshot in &mut snapshots {
            snapshot.history = (first_minute..=now_minute)
                .map(|minute| {
                    let (requests, rejections) = self
                        .minutes
                        .get(&(minute, snapshot.route_id.clone()))
                        .map(|b| b.counts())
                        .unwrap_or_default();
                    MinutePoint {
                        timestamp: millis_to_datetime(minute * MINUTE_MS),
                        requests,
                        rejections,
                    }
                })
                .collect();
        }

        snapshots.sort_by(|a, b| a.route_id.cmp(&b.route_id));
        snapshots
    }

    /// Snapshot for one route, if it has been seen.
    pub fn route_snapshot(&self, route_id: &str) -> Option<RouteSnapshot> {
        self.route_snapshots()
            .into_iter()
            .find(|s| s.route_id == route_id)
    }

    /// Rejection counts by reason tag. Reasons never seen are omitted.
    pub fn rejection_reasons(&self) -> BTreeMap<String, u64> {
        self.reasons
            .iter()
            .map(|entry| (entry.key().as_str().to_string(), entry.value().load(Ordering::Relaxed)))
            .filter(|(_, count)| *count > 0)
            .collect()
    }

    /// Aggregate minute rollups into the points of `range`, optionally for a
    /// single route.
    pub fn time_series(&self, range: TimeRange, route: Option<&str>) -> TimeSeries {
        let now_minute = self.clock.now_millis() / MINUTE_MS;
        let mut builder = SeriesBuilder::new(range, now_minute);

        for entry in self.minutes.iter() {
            let (minute, route_id) = entry.key();
            if route.is_some_and(|r| r != route_id.as_str()) {
                continue;
            }
            let (requests, rejections) = entry.value().counts();
            builder.add(*minute, requests, rejections);
        }

        TimeSeries {
            range,
            route: route.map(str::to_string),
            points: builder.finish(),
        }
    }

    /// Drop buckets older than their retention. Returns how many second and
    /// minute buckets were removed.
    pub fn sweep(&self, now_ms: u64) -> (usize, usize) {
        let oldest_second = (now_ms / 1000).saturating_sub(self.config.raw_retention_secs);
        let oldest_minute =
            (now_ms / MINUTE_MS).saturating_sub(self.config.series_retention_days * 1440);

        let seconds_before = self.seconds.len();
        self.seconds.retain(|(second, _), _| *second >= oldest_second);
        let minutes_before = self.minutes.len();
        self.minutes.retain(|(minute, _), _| *minute >= oldest_minute);

        (
            seconds_before.saturating_sub(self.seconds.len()),
            minutes_before.saturating_sub(self.minutes.len()),
        )
    }

    /// Sweep on a schedule until shutdown.
    pub async fn run_sweeper(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let mut ticker = time::interval(interval);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let (seconds, minutes) = self.sweep(self.clock.now_millis());
                    if seconds + minutes > 0 {
                        tracing::debug!(seconds, minutes, "Evicted expired metrics buckets");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Metrics sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

fn millis_to_datetime(ms: u64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms as i64).unwrap_or_default()
}
