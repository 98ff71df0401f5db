// crates/serial-retry-core/src/core/catalog.rs
// ============================================================================
// Module: Status Code Catalog
// Description: Configurable set of retryable backend status codes.
// Purpose: Decide whether a single status code denotes a transient conflict.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`StatusCodeCatalog`] holds exact codes and code prefixes. Backends signal
//! the same serialization conflict with different codes, so the catalog is
//! data, not code: each dialect ships a default and deployments may replace it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Retryable status codes, matched by exact value or prefix.
///
/// # Invariants
/// - An empty catalog matches nothing.
/// - Prefix matching is byte-wise `starts_with`; an empty prefix never matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCodeCatalog {
    /// Codes matched by exact equality.
    #[serde(default)]
    codes: BTreeSet<String>,
    /// Codes matched by prefix.
    #[serde(default)]
    prefixes: BTreeSet<String>,
}

impl StatusCodeCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an exact-match code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.codes.insert(code.into());
        self
    }

    /// Adds a prefix; empty prefixes are ignored.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        if !prefix.is_empty() {
            self.prefixes.insert(prefix);
        }
        self
    }

    /// Returns true when `code` equals a catalog code or starts with a prefix.
    #[must_use]
    pub fn matches(&self, code: &str) -> bool {
        self.codes.contains(code)
            || self.prefixes.iter().any(|prefix| !prefix.is_empty() && code.starts_with(prefix.as_str()))
    }

    /// Returns true when the catalog has neither codes nor prefixes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty() && self.prefixes.is_empty()
    }

    /// Returns the exact-match codes in sorted order.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.codes.iter().map(String::as_str)
    }

    /// Returns the prefixes in sorted order.
    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.prefixes.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::StatusCodeCatalog;

    #[test]
    fn catalog_matches_exact_and_prefix() {
        let catalog = StatusCodeCatalog::new().with_code("40P01").with_prefix("40001");
        assert!(catalog.matches("40P01"));
        assert!(catalog.matches("40001"));
        assert!(catalog.matches("40001-restart"));
        assert!(!catalog.matches("40P0"));
        assert!(!catalog.matches("23505"));
    }

    #[test]
    fn catalog_ignores_empty_prefix() {
        let catalog = StatusCodeCatalog::new().with_prefix("");
        assert!(catalog.is_empty());
        assert!(!catalog.matches("40001"));
    }

    #[test]
    fn empty_catalog_matches_nothing() {
        assert!(!StatusCodeCatalog::new().matches(""));
    }
}
