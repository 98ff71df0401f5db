// crates/serial-retry-sqlite/src/probe.rs
// ============================================================================
// Module: SQLite Status Codes
// Description: Maps rusqlite failures to stable SQLITE_* result-code names.
// Purpose: Feed SQLite conflicts into the core classifier.
// Dependencies: rusqlite, serial-retry-core
// ============================================================================

//! ## Overview
//! Extended result codes are reported when `SQLite` provides one, so
//! `SQLITE_BUSY_SNAPSHOT` and friends match the dialect's `SQLITE_BUSY`
//! prefix while staying distinguishable in logs.

use std::error::Error;

use rusqlite::ErrorCode;
use serial_retry_core::Dialect;
use serial_retry_core::ErrorClassifier;
use serial_retry_core::StatusCodeCatalog;
use serial_retry_core::StatusCodeProbe;

// ============================================================================
// SECTION: Extended Codes
// ============================================================================

/// `SQLITE_BUSY | (1 << 8)`.
const SQLITE_BUSY_RECOVERY: i32 = 261;
/// `SQLITE_BUSY | (2 << 8)`.
const SQLITE_BUSY_SNAPSHOT: i32 = 517;
/// `SQLITE_BUSY | (3 << 8)`.
const SQLITE_BUSY_TIMEOUT: i32 = 773;
/// `SQLITE_LOCKED | (1 << 8)`.
const SQLITE_LOCKED_SHAREDCACHE: i32 = 262;
/// `SQLITE_LOCKED | (2 << 8)`.
const SQLITE_LOCKED_VTAB: i32 = 518;

// ============================================================================
// SECTION: Mapping
// ============================================================================

/// Returns the `SQLITE_*` name for an engine failure, or `None` for errors
/// that did not come from the engine (type conversion, missing rows, ...).
#[must_use]
pub fn sqlite_status_code(error: &rusqlite::Error) -> Option<&'static str> {
    let rusqlite::Error::SqliteFailure(failure, _) = error else {
        return None;
    };
    let extended = match failure.extended_code {
        SQLITE_BUSY_RECOVERY => Some("SQLITE_BUSY_RECOVERY"),
        SQLITE_BUSY_SNAPSHOT => Some("SQLITE_BUSY_SNAPSHOT"),
        SQLITE_BUSY_TIMEOUT => Some("SQLITE_BUSY_TIMEOUT"),
        SQLITE_LOCKED_SHAREDCACHE => Some("SQLITE_LOCKED_SHAREDCACHE"),
        SQLITE_LOCKED_VTAB => Some("SQLITE_LOCKED_VTAB"),
        _ => None,
    };
    Some(extended.unwrap_or_else(|| primary_name(failure.code)))
}

/// Returns the primary result-code name.
const fn primary_name(code: ErrorCode) -> &'static str {
    match code {
        ErrorCode::DatabaseBusy => "SQLITE_BUSY",
        ErrorCode::DatabaseLocked => "SQLITE_LOCKED",
        ErrorCode::ConstraintViolation => "SQLITE_CONSTRAINT",
        ErrorCode::ReadOnly => "SQLITE_READONLY",
        ErrorCode::OperationInterrupted => "SQLITE_INTERRUPT",
        ErrorCode::SystemIoFailure => "SQLITE_IOERR",
        ErrorCode::DatabaseCorrupt => "SQLITE_CORRUPT",
        ErrorCode::DiskFull => "SQLITE_FULL",
        ErrorCode::CannotOpen => "SQLITE_CANTOPEN",
        ErrorCode::SchemaChanged => "SQLITE_SCHEMA",
        ErrorCode::TypeMismatch => "SQLITE_MISMATCH",
        ErrorCode::ApiMisuse => "SQLITE_MISUSE",
        _ => "SQLITE_ERROR",
    }
}

// ============================================================================
// SECTION: Probe
// ============================================================================

/// Reads `SQLite` result codes from `rusqlite::Error` links.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteProbe;

impl StatusCodeProbe for SqliteProbe {
    fn status_code(&self, link: &(dyn Error + 'static)) -> Option<String> {
        link.downcast_ref::<rusqlite::Error>()
            .and_then(sqlite_status_code)
            .map(str::to_string)
    }
}

/// Returns a classifier for the `SQLite` dialect.
#[must_use]
pub fn classifier() -> ErrorClassifier {
    classifier_with_catalog(Dialect::Sqlite.default_catalog())
}

/// Returns a classifier over an explicit catalog with the `SQLite` probe.
#[must_use]
pub fn classifier_with_catalog(catalog: StatusCodeCatalog) -> ErrorClassifier {
    ErrorClassifier::new(catalog).with_probe(SqliteProbe)
}

#[cfg(test)]
mod tests {
    use rusqlite::ErrorCode;
    use rusqlite::ffi;

    use serial_retry_core::StatusCodeCatalog;

    use super::classifier;
    use super::classifier_with_catalog;
    use super::sqlite_status_code;
    use crate::session::SqliteSessionError;

    fn failure(code: i32) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(ffi::Error::new(code), None)
    }

    #[test]
    fn extended_busy_codes_keep_their_names() {
        assert_eq!(sqlite_status_code(&failure(517)), Some("SQLITE_BUSY_SNAPSHOT"));
        assert_eq!(sqlite_status_code(&failure(5)), Some("SQLITE_BUSY"));
        assert_eq!(sqlite_status_code(&failure(6)), Some("SQLITE_LOCKED"));
    }

    #[test]
    fn non_engine_errors_have_no_code() {
        assert_eq!(sqlite_status_code(&rusqlite::Error::QueryReturnedNoRows), None);
    }

    #[test]
    fn busy_inside_session_error_is_retryable() {
        let error = SqliteSessionError::Db(failure(517));
        assert!(classifier().is_retryable(&error));
        assert_eq!(ffi::Error::new(517).code, ErrorCode::DatabaseBusy);
    }

    #[test]
    fn constraint_violation_is_fatal() {
        assert!(!classifier().is_retryable(&failure(2067)));
    }

    #[test]
    fn catalog_override_narrows_matches() {
        let catalog = StatusCodeCatalog::new().with_code("SQLITE_BUSY_SNAPSHOT");
        let narrowed = classifier_with_catalog(catalog);
        assert!(narrowed.is_retryable(&failure(517)));
        assert!(!narrowed.is_retryable(&failure(5)));
    }
}
