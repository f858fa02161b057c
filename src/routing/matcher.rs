//! Path prefix matching.
//!
//! # Responsibilities
//! - Reduce a route predicate to its canonical prefix
//! - Match request paths against that prefix
//!
//! # Design Decisions
//! - One canonical rule everywhere: strip a single trailing wildcard marker,
//!   trying `/**`, `**`, `/*`, `*` in that order
//! - Path matching is case-sensitive
//! - An empty canonical prefix (`/**`) matches every path
//! - No regex to guarantee O(n) matching

/// Trailing wildcard markers, most specific first.
const WILDCARD_SUFFIXES: [&str; 4] = ["/**", "**", "/*", "*"];

/// Strip one trailing wildcard marker from a predicate.
///
/// `"/api/**"` → `"/api"`, `"/static/*"` → `"/static"`, `"/users"` → `"/users"`.
pub fn canonical_prefix(predicate: &str) -> &str {
    let trimmed = predicate.trim();
    WILDCARD_SUFFIXES
        .iter()
        .find_map(|suffix| trimmed.strip_suffix(suffix))
        .unwrap_or(trimmed)
}

/// Matches the request path against a route predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefixMatcher {
    predicate: String,
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher from a raw predicate.
    pub fn new(predicate: impl Into<String>) -> Self {
        let predicate = predicate.into();
        let prefix = canonical_prefix(&predicate).to_string();
        Self { predicate, prefix }
    }

    /// The predicate as configured.
    pub fn predicate(&self) -> &str {
        &self.predicate
    }

    /// The canonical prefix used for matching and specificity ordering.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns true if `path` starts with the canonical prefix.
    pub fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.prefix)
    }
}
