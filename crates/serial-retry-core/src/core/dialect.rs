// crates/serial-retry-core/src/core/dialect.rs
// ============================================================================
// Module: Backend Dialects
// Description: Per-backend defaults for retryable codes and rewind behavior.
// Purpose: Keep dialect knowledge in one table instead of scattered literals.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Each supported backend signals serialization conflicts differently and
//! supports partial rollback to a different degree. [`Dialect`] maps a backend
//! to its default [`StatusCodeCatalog`], savepoint name, and
//! [`RewindStrategy`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::catalog::StatusCodeCatalog;
use crate::runtime::policy::RetryBudget;
use crate::runtime::policy::RetryPolicy;
use crate::runtime::policy::RewindStrategy;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// SQLSTATE `serialization_failure`; `CockroachDB` reports every retryable
/// transaction error under this class.
pub const SQLSTATE_SERIALIZATION_FAILURE: &str = "40001";
/// SQLSTATE `deadlock_detected`.
pub const SQLSTATE_DEADLOCK_DETECTED: &str = "40P01";
/// `SQLite` busy result family.
pub const SQLITE_BUSY: &str = "SQLITE_BUSY";
/// `SQLite` locked result family.
pub const SQLITE_LOCKED: &str = "SQLITE_LOCKED";
/// Savepoint name `CockroachDB` recognizes for client-side retries.
pub const COCKROACH_RESTART_SAVEPOINT: &str = "cockroach_restart";
/// Savepoint name used by dialects without a reserved one.
pub const DEFAULT_SAVEPOINT: &str = "retry_point";

// ============================================================================
// SECTION: Dialect
// ============================================================================

/// Supported backend dialects.
///
/// # Invariants
/// - Variants are stable for configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// `PostgreSQL` at `SERIALIZABLE` isolation.
    Postgres,
    /// `CockroachDB` (Postgres wire protocol).
    #[default]
    Cockroach,
    /// Embedded `SQLite`.
    Sqlite,
}

impl Dialect {
    /// Returns a stable label for the dialect.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Cockroach => "cockroach",
            Self::Sqlite => "sqlite",
        }
    }

    /// Returns the retryable status codes this backend emits.
    #[must_use]
    pub fn default_catalog(self) -> StatusCodeCatalog {
        match self {
            Self::Postgres => StatusCodeCatalog::new()
                .with_prefix(SQLSTATE_SERIALIZATION_FAILURE)
                .with_code(SQLSTATE_DEADLOCK_DETECTED),
            Self::Cockroach => StatusCodeCatalog::new().with_prefix(SQLSTATE_SERIALIZATION_FAILURE),
            Self::Sqlite => StatusCodeCatalog::new().with_prefix(SQLITE_BUSY).with_prefix(SQLITE_LOCKED),
        }
    }

    /// Returns the savepoint name used as the rollback point.
    #[must_use]
    pub const fn default_savepoint_name(self) -> &'static str {
        match self {
            Self::Cockroach => COCKROACH_RESTART_SAVEPOINT,
            Self::Postgres | Self::Sqlite => DEFAULT_SAVEPOINT,
        }
    }

    /// Returns how the backend should be rewound between attempts.
    ///
    /// `PostgreSQL` and `SQLite` bind the read snapshot to the top-level
    /// transaction, so `ROLLBACK TO` keeps it stale and the conflict recurs.
    /// Only `CockroachDB` resets the transaction at `cockroach_restart`.
    #[must_use]
    pub const fn default_rewind(self) -> RewindStrategy {
        match self {
            Self::Cockroach => RewindStrategy::Savepoint,
            Self::Postgres | Self::Sqlite => RewindStrategy::Restart,
        }
    }

    /// Returns a policy with this dialect's rewind strategy and savepoint.
    #[must_use]
    pub fn default_policy(self, budget: RetryBudget) -> RetryPolicy {
        RetryPolicy::new(budget)
            .with_rewind(self.default_rewind())
            .with_savepoint_name(self.default_savepoint_name())
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::Dialect;
    use crate::runtime::policy::RetryBudget;
    use crate::runtime::policy::RewindStrategy;

    #[test]
    fn cockroach_defaults_use_restart_savepoint() {
        let dialect = Dialect::Cockroach;
        assert_eq!(dialect.default_savepoint_name(), "cockroach_restart");
        assert_eq!(dialect.default_rewind(), RewindStrategy::Savepoint);
        assert!(dialect.default_catalog().matches("40001"));
        assert!(!dialect.default_catalog().matches("40P01"));
    }

    #[test]
    fn postgres_defaults_include_deadlock() {
        let catalog = Dialect::Postgres.default_catalog();
        assert!(catalog.matches("40001"));
        assert!(catalog.matches("40P01"));
        assert!(!catalog.matches("23505"));
    }

    #[test]
    fn postgres_defaults_restart_the_transaction() {
        let budget = RetryBudget::new(5).unwrap_or_default();
        let policy = Dialect::Postgres.default_policy(budget);
        assert_eq!(Dialect::Postgres.default_rewind(), RewindStrategy::Restart);
        assert_eq!(policy.rewind(), RewindStrategy::Restart);
        assert_eq!(policy.budget().get(), 5);
    }

    #[test]
    fn sqlite_defaults_cover_extended_busy_codes() {
        let catalog = Dialect::Sqlite.default_catalog();
        assert!(catalog.matches("SQLITE_BUSY"));
        assert!(catalog.matches("SQLITE_BUSY_SNAPSHOT"));
        assert!(catalog.matches("SQLITE_LOCKED_SHAREDCACHE"));
        assert!(!catalog.matches("SQLITE_CONSTRAINT"));
        assert_eq!(Dialect::Sqlite.default_rewind(), RewindStrategy::Restart);
    }
}
