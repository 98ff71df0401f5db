// crates/serial-retry-postgres/src/probe.rs
// ============================================================================
// Module: SQLSTATE Probe
// Description: Reads SQLSTATE codes from postgres driver errors.
// Purpose: Feed Postgres-wire conflicts into the core classifier.
// Dependencies: postgres, serial-retry-core
// ============================================================================

//! ## Overview
//! The driver reports server failures as `postgres::Error` wrapping a
//! `postgres::error::DbError`. [`PostgresProbe`] reads the SQLSTATE from
//! either link so the core classifier finds it wherever the work unit wrapped
//! the error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::error::Error;

use serial_retry_core::Dialect;
use serial_retry_core::ErrorClassifier;
use serial_retry_core::StatusCodeCatalog;
use serial_retry_core::StatusCodeProbe;

/// Reads SQLSTATE from `postgres::Error` and server `DbError` links.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresProbe;

impl StatusCodeProbe for PostgresProbe {
    fn status_code(&self, link: &(dyn Error + 'static)) -> Option<String> {
        if let Some(error) = link.downcast_ref::<postgres::Error>() {
            return error.code().map(|state| state.code().to_string());
        }
        link.downcast_ref::<postgres::error::DbError>().map(|error| error.code().code().to_string())
    }
}

/// Returns a classifier with the dialect's default catalog.
#[must_use]
pub fn classifier(dialect: Dialect) -> ErrorClassifier {
    classifier_with_catalog(dialect.default_catalog())
}

/// Returns a classifier with an explicit catalog.
#[must_use]
pub fn classifier_with_catalog(catalog: StatusCodeCatalog) -> ErrorClassifier {
    ErrorClassifier::new(catalog).with_probe(PostgresProbe)
}
