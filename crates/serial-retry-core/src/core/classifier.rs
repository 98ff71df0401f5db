// crates/serial-retry-core/src/core/classifier.rs
// ============================================================================
// Module: Error Classifier
// Description: Retryable-conflict detection over full error cause chains.
// Purpose: Separate transient serialization conflicts from permanent failures.
// Dependencies: crate::core::{catalog, status}
// ============================================================================

//! ## Overview
//! [`ErrorClassifier`] walks an error and every cause reachable through
//! [`std::error::Error::source`]. Each link is offered to the registered
//! [`StatusCodeProbe`]s; the first status code found anywhere in the chain that
//! the [`StatusCodeCatalog`] accepts makes the error retryable. Errors with no
//! discoverable code are never retryable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::error::Error;
use std::fmt;
use std::iter;
use std::sync::Arc;

use crate::core::catalog::StatusCodeCatalog;
use crate::core::status::DbError;

// ============================================================================
// SECTION: Probes
// ============================================================================

/// Extracts a backend status code from one link of an error chain.
///
/// Probes inspect a single link only; the classifier owns chain traversal.
pub trait StatusCodeProbe: Send + Sync {
    /// Returns the status code carried by `link`, if this probe recognizes it.
    fn status_code(&self, link: &(dyn Error + 'static)) -> Option<String>;
}

/// Probe for the crate's own tagged [`DbError`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DbErrorProbe;

impl StatusCodeProbe for DbErrorProbe {
    fn status_code(&self, link: &(dyn Error + 'static)) -> Option<String> {
        link.downcast_ref::<DbError>()
            .and_then(DbError::code)
            .map(|code| code.as_str().to_string())
    }
}

// ============================================================================
// SECTION: Classifier
// ============================================================================

/// Decides whether an error denotes a transient, retryable conflict.
///
/// # Invariants
/// - Classification is pure; no probe or catalog is mutated.
/// - [`DbErrorProbe`] is always registered.
#[derive(Clone)]
pub struct ErrorClassifier {
    /// Retryable status codes.
    catalog: StatusCodeCatalog,
    /// Registered link probes, consulted in order.
    probes: Vec<Arc<dyn StatusCodeProbe>>,
}

impl ErrorClassifier {
    /// Creates a classifier that recognizes [`DbError`] links.
    #[must_use]
    pub fn new(catalog: StatusCodeCatalog) -> Self {
        Self {
            catalog,
            probes: vec![Arc::new(DbErrorProbe)],
        }
    }

    /// Registers an additional probe for a backend-native error type.
    #[must_use]
    pub fn with_probe(mut self, probe: impl StatusCodeProbe + 'static) -> Self {
        self.probes.push(Arc::new(probe));
        self
    }

    /// Returns the catalog in use.
    #[must_use]
    pub const fn catalog(&self) -> &StatusCodeCatalog {
        &self.catalog
    }

    /// Returns true when any link of the chain carries a retryable code.
    #[must_use]
    pub fn is_retryable(&self, error: &(dyn Error + 'static)) -> bool {
        self.retryable_code(error).is_some()
    }

    /// Returns the first retryable code found while walking the chain.
    #[must_use]
    pub fn retryable_code(&self, error: &(dyn Error + 'static)) -> Option<String> {
        iter::successors(Some(error), |&link| link.source())
            .flat_map(|link| self.probes.iter().filter_map(move |probe| probe.status_code(link)))
            .find(|code| self.catalog.matches(code))
    }
}

impl fmt::Debug for ErrorClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorClassifier")
            .field("catalog", &self.catalog)
            .field("probes", &self.probes.len())
            .finish()
    }
}
