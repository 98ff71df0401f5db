// crates/serial-retry-sqlite/src/session.rs
// ============================================================================
// Module: SQLite Sessions
// Description: Transaction-control surface and provider over rusqlite.
// Purpose: Let the coordinator begin, rewind, and commit SQLite transactions.
// Dependencies: rusqlite, serial-retry-core, thiserror, tracing
// ============================================================================

//! ## Overview
//! A [`SqliteSession`] owns one connection and issues raw transaction
//! statements so the coordinator, not rusqlite's RAII guards, decides when to
//! commit or rewind. Transaction state is read back from the connection's
//! autocommit flag, so an engine-side automatic rollback is never mistaken
//! for an open transaction.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use rusqlite::Connection;
use rusqlite::OpenFlags;
use serial_retry_core::Session;
use serial_retry_core::SessionProvider;
use serial_retry_core::is_valid_savepoint_name;
use thiserror::Error;

use crate::config::SqliteBeginMode;
use crate::config::SqliteSessionConfig;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` session errors.
///
/// # Invariants
/// - `Db` keeps the rusqlite error as its source so status codes stay
///   reachable by cause-chain classification.
#[derive(Debug, Error)]
pub enum SqliteSessionError {
    /// `SQLite` engine error.
    #[error("sqlite session db error: {0}")]
    Db(#[from] rusqlite::Error),
    /// Invalid configuration or argument.
    #[error("sqlite session invalid: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Session
// ============================================================================

/// One `SQLite` connection driven by the coordinator.
#[derive(Debug)]
pub struct SqliteSession {
    /// Open connection.
    connection: Connection,
    /// Lock acquisition mode used by `begin`.
    begin_mode: SqliteBeginMode,
}

impl SqliteSession {
    /// Opens a connection with the configured pragmas.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSessionError`] when the database cannot be opened.
    pub fn open(config: &SqliteSessionConfig) -> Result<Self, SqliteSessionError> {
        Ok(Self {
            connection: open_connection(config)?,
            begin_mode: config.begin_mode,
        })
    }

    /// Returns the connection for issuing statements inside a work unit.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Returns true while a transaction is open on the connection.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        !self.connection.is_autocommit()
    }

    /// Runs a control statement.
    fn control(&self, sql: &str) -> Result<(), SqliteSessionError> {
        self.connection.execute_batch(sql)?;
        Ok(())
    }
}

impl Session for SqliteSession {
    type Error = SqliteSessionError;

    fn begin(&mut self) -> Result<(), SqliteSessionError> {
        if self.in_transaction() {
            return Err(SqliteSessionError::Invalid("transaction already open".to_string()));
        }
        self.control(self.begin_mode.begin_statement())
    }

    fn savepoint(&mut self, name: &str) -> Result<(), SqliteSessionError> {
        checked_name(name)?;
        self.control(&format!("SAVEPOINT {name}"))
    }

    fn rollback_to_savepoint(&mut self, name: &str) -> Result<(), SqliteSessionError> {
        checked_name(name)?;
        self.control(&format!("ROLLBACK TO SAVEPOINT {name}"))
    }

    fn commit(&mut self) -> Result<(), SqliteSessionError> {
        self.control("COMMIT")
    }

    fn rollback(&mut self) -> Result<(), SqliteSessionError> {
        if !self.in_transaction() {
            return Ok(());
        }
        self.control("ROLLBACK")
    }
}

impl Drop for SqliteSession {
    fn drop(&mut self) {
        if self.in_transaction()
            && let Err(err) = self.connection.execute_batch("ROLLBACK")
        {
            tracing::warn!(error = %err, "sqlite session rollback on drop failed");
        }
    }
}

// ============================================================================
// SECTION: Provider
// ============================================================================

/// Opens one [`SqliteSession`] per acquire.
#[derive(Debug, Clone)]
pub struct SqliteSessionProvider {
    /// Session configuration.
    config: SqliteSessionConfig,
}

impl SqliteSessionProvider {
    /// Validates `config` and opens the database once so the journal mode is
    /// persisted before workers connect.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSessionError`] when validation or opening fails.
    pub fn new(config: SqliteSessionConfig) -> Result<Self, SqliteSessionError> {
        config.validate()?;
        drop(open_connection(&config)?);
        Ok(Self {
            config,
        })
    }

    /// Returns the session configuration.
    #[must_use]
    pub const fn config(&self) -> &SqliteSessionConfig {
        &self.config
    }

    /// Runs setup SQL (schema creation, seeding) outside the coordinator.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSessionError`] when the batch fails.
    pub fn execute_batch(&self, sql: &str) -> Result<(), SqliteSessionError> {
        open_connection(&self.config)?.execute_batch(sql)?;
        Ok(())
    }
}

impl SessionProvider for SqliteSessionProvider {
    type Error = SqliteSessionError;
    type Session = SqliteSession;

    fn acquire(&self) -> Result<SqliteSession, SqliteSessionError> {
        SqliteSession::open(&self.config)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Rejects savepoint names that are not plain identifiers.
fn checked_name(name: &str) -> Result<(), SqliteSessionError> {
    if is_valid_savepoint_name(name) {
        Ok(())
    } else {
        Err(SqliteSessionError::Invalid(format!("invalid savepoint name: '{name}'")))
    }
}

/// Opens an `SQLite` connection with the configured pragmas.
fn open_connection(config: &SqliteSessionConfig) -> Result<Connection, SqliteSessionError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies pragmas; the busy timeout goes first so the journal-mode switch
/// waits on concurrent openers instead of failing.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteSessionConfig,
) -> Result<(), SqliteSessionError> {
    connection.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))?;
    Ok(())
}
