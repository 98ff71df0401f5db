// crates/serial-retry-sqlite/src/lib.rs
// ============================================================================
// Module: Serial Retry SQLite Adapter
// Description: SQLite sessions, providers, and status-code probes.
// Purpose: Run coordinator-managed transactions against embedded SQLite.
// Dependencies: rusqlite, serial-retry-core, serde, thiserror, tracing
// ============================================================================

//! ## Overview
//! `SQLite` serializes writers with a single database lock. Under WAL, a
//! deferred transaction whose read snapshot went stale fails its first write
//! with `SQLITE_BUSY_SNAPSHOT`, and a writer that cannot get the lock within
//! the busy timeout fails with `SQLITE_BUSY`. Both map to the
//! [`serial_retry_core::Dialect::Sqlite`] catalog and are retried by
//! restarting the transaction.

pub mod config;
pub mod probe;
pub mod session;

pub use config::SqliteBeginMode;
pub use config::SqliteJournalMode;
pub use config::SqliteSessionConfig;
pub use config::SqliteSyncMode;
pub use probe::SqliteProbe;
pub use probe::classifier;
pub use probe::classifier_with_catalog;
pub use probe::sqlite_status_code;
pub use session::SqliteSession;
pub use session::SqliteSessionError;
pub use session::SqliteSessionProvider;
