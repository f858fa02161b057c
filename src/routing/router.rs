//! Route table and lookup.
//!
//! # Responsibilities
//! - Validate raw route specs into routes (skip and log bad ones)
//! - Order routes by specificity once, at build time
//! - Look up the matching route for a request path
//!
//! # Design Decisions
//! - Immutable after construction (shared via `ArcSwap`, read without locks)
//! - Longest canonical prefix first; stable sort keeps fetch order for ties
//! - O(n) prefix scan (acceptable for typical route counts)
//! - Explicit `None` rather than silent default

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::routing::route::{Route, RouteError, RouteSpec};

/// Immutable, specificity-ordered snapshot of active routes.
#[derive(Debug)]
pub struct RouteTable {
    routes: Vec<Arc<Route>>,
    skipped: Vec<RouteError>,
    generation: u64,
    built_at: DateTime<Utc>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::empty()
    }
}

impl RouteTable {
    /// A table with no routes. Every lookup misses.
    pub fn empty() -> Self {
        Self {
            routes: Vec::new(),
            skipped: Vec::new(),
            generation: 0,
            built_at: Utc::now(),
        }
    }

    /// Build a table from raw specs.
    ///
    /// Invalid specs and duplicate route ids are skipped with a warning.
    /// Disabled specs are dropped silently.
    pub fn build(specs: impl IntoIterator<Item = RouteSpec>) -> Self {
        let mut routes = Vec::new();
        let mut skipped = Vec::new();
        let mut seen = HashSet::new();

        for spec in specs {
            if !spec.enabled {
                tracing::debug!(route_id = %spec.effective_route_id(), "Skipping disabled route");
                continue;
            }

            let route = match Route::from_spec(spec) {
                Ok(route) => route,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping invalid route");
                    skipped.push(e);
                    continue;
                }
            };

            if !seen.insert(route.route_id.clone()) {
                let e = RouteError::DuplicateRouteId {
                    route_id: route.route_id.clone(),
                };
                tracing::warn!(error = %e, "Skipping duplicate route");
                skipped.push(e);
                continue;
            }

            routes.push(Arc::new(route));
        }

        // Vec::sort_by is stable: equal prefixes keep fetch order.
        routes.sort_by(|a, b| b.prefix().len().cmp(&a.prefix().len()));

        Self {
            routes,
            skipped,
            generation: 0,
            built_at: Utc::now(),
        }
    }

    /// Tag the table with the refresh cycle that produced it.
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    /// Find the most specific route for `path`.
    pub fn match_path(&self, path: &str) -> Option<&Arc<Route>> {
        self.routes.iter().find(|route| route.matches(path))
    }

    /// Look up a route by id.
    pub fn get(&self, route_id: &str) -> Option<&Arc<Route>> {
        self.routes.iter().find(|route| route.route_id == route_id)
    }

    /// Routes in match order.
    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    /// Specs rejected during the build.
    pub fn skipped(&self) -> &[RouteError] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }
}
