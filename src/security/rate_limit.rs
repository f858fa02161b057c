//! Per-client, per-route fixed window rate limiting.
//!
//! # Responsibilities
//! - Count requests per (client, route) key inside a fixed window
//! - Reset a window lazily once it has expired
//! - Sweep idle windows in the background
//!
//! # Design Decisions
//! - Check-and-increment runs under one mutex per key, so two concurrent
//!   requests can never both take the last slot
//! - Keys live in a sharded `DashMap`; lookups take a shard read lock only,
//!   so different keys do not serialize on each other
//! - Rejections never mutate the count
//! - State is in-memory only and starts empty after a restart

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::time;

use crate::clock::Clock;

/// Identifies one rate window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    pub client: String,
    pub route_id: String,
}

impl RateLimitKey {
    pub fn new(client: impl Into<String>, route_id: impl Into<String>) -> Self {
        Self {
            client: client.into(),
            route_id: route_id.into(),
        }
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.client, self.route_id)
    }
}

/// Counter state for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitWindow {
    pub window_start: u64,
    pub count: u32,
    /// Window length from the most recent check; a route reload may change it.
    pub window_ms: u64,
}

impl RateLimitWindow {
    fn is_expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.window_start) > self.window_ms
    }

    /// When the window stops counting requests.
    fn ends_at(&self) -> u64 {
        self.window_start.saturating_add(self.window_ms)
    }
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    /// Requests left in the current window.
    pub remaining: u32,
    /// Milliseconds until the current window expires.
    pub reset_after_ms: u64,
}

/// Fixed window limiter keyed by client and route.
#[derive(Debug)]
pub struct RateLimiter {
    windows: DashMap<RateLimitKey, Mutex<RateLimitWindow>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            windows: DashMap::new(),
        }
    }

    /// Count one request for `key` and decide whether it may proceed.
    pub fn allow(
        &self,
        key: &RateLimitKey,
        max_requests: u32,
        window_ms: u64,
        now_ms: u64,
    ) -> RateDecision {
        if let Some(entry) = self.windows.get(key) {
            return Self::check(&entry, max_requests, window_ms, now_ms);
        }

        // First request for this key. `or_insert_with` resolves races between
        // concurrent first requests to a single entry; the write guard is
        // downgraded so the per-key mutex, not the shard, serializes the check.
        let entry = self
            .windows
            .entry(key.clone())
            .or_insert_with(|| {
                Mutex::new(RateLimitWindow {
                    window_start: now_ms,
                    count: 0,
                    window_ms,
                })
            })
            .downgrade();
        Self::check(&entry, max_requests, window_ms, now_ms)
    }

    fn check(
        entry: &Mutex<RateLimitWindow>,
        max_requests: u32,
        window_ms: u64,
        now_ms: u64,
    ) -> RateDecision {
        let mut window = entry.lock().unwrap_or_else(PoisonError::into_inner);
        window.window_ms = window_ms;

        if window.is_expired(now_ms) {
            window.window_start = now_ms;
            window.count = 0;
        }

        let reset_after_ms = window.ends_at().saturating_sub(now_ms);

        if window.count < max_requests {
            window.count += 1;
            RateDecision {
                allowed: true,
                limit: max_requests,
                remaining: max_requests - window.count,
                reset_after_ms,
            }
        } else {
            RateDecision {
                allowed: false,
                limit: max_requests,
                remaining: 0,
                reset_after_ms,
            }
        }
    }

    /// Current state of a key's window, if one exists.
    pub fn window(&self, key: &RateLimitKey) -> Option<RateLimitWindow> {
        self.windows
            .get(key)
            .map(|entry| *entry.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Remove windows that have expired and then sat idle for `idle_ttl_ms`.
    ///
    /// Returns the number of windows removed. An entry referenced by an
    /// in-flight check holds its shard's read lock, so it cannot be removed
    /// mid-check.
    pub fn sweep(&self, now_ms: u64, idle_ttl_ms: u64) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, entry| {
            let window = entry.get_mut().unwrap_or_else(PoisonError::into_inner);
            now_ms.saturating_sub(window.ends_at()) <= idle_ttl_ms
        });
        before.saturating_sub(self.windows.len())
    }

    /// Sweep on a schedule until shutdown.
    pub async fn run_sweeper(
        self: Arc<Self>,
        clock: Arc<dyn Clock>,
        interval: Duration,
        idle_ttl: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let mut ticker = time::interval(interval);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.sweep(clock.now_millis(), idle_ttl.as_millis() as u64);
                    if removed > 0 {
                        tracing::debug!(removed, remaining = self.len(), "Swept idle rate limit windows");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Rate limit sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
