// crates/serial-retry-core/src/core/status.rs
// ============================================================================
// Module: Backend Status Codes
// Description: Backend status codes and the tagged database error.
// Purpose: Give every backend failure a walkable, code-carrying representation.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Backends report failures with dialect-specific status strings (SQLSTATE for
//! Postgres-wire servers, `SQLITE_*` names for `SQLite`). [`DbError`] is the
//! backend-neutral carrier: an optional [`StatusCode`], a message, and an
//! optional wrapped inner error. Wrapping forms an explicit cause chain that
//! the classifier walks link by link.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::error::Error;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Status Code
// ============================================================================

/// Backend-specific status code (SQLSTATE, `SQLite` result name, ...).
///
/// # Invariants
/// - Opaque string; compared byte-for-byte, never normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(String);

impl StatusCode {
    /// Creates a new status code.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// SECTION: Tagged Database Error
// ============================================================================

/// Boxed inner error carried by [`DbError`].
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Backend-neutral database error with an optional status code and cause.
///
/// # Invariants
/// - `source()` returns the wrapped inner error, so nested [`DbError`] values
///   form a chain walkable through [`std::error::Error::source`].
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct DbError {
    /// Status code reported by the backend, when known.
    code: Option<StatusCode>,
    /// Human-readable failure description.
    message: String,
    /// Wrapped inner error.
    #[source]
    source: Option<BoxError>,
}

impl DbError {
    /// Creates an error without a status code or cause.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            source: None,
        }
    }

    /// Creates an error tagged with a backend status code.
    #[must_use]
    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(StatusCode::new(code)),
            message: message.into(),
            source: None,
        }
    }

    /// Wraps an inner error as the cause of this one.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Returns the status code carried by this link, if any.
    #[must_use]
    pub const fn code(&self) -> Option<&StatusCode> {
        self.code.as_ref()
    }

    /// Returns the error message of this link.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}
