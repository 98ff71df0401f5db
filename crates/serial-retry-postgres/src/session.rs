// crates/serial-retry-postgres/src/session.rs
// ============================================================================
// Module: Postgres Sessions
// Description: Transaction-control surface and pooled provider over postgres.
// Purpose: Let the coordinator begin, rewind, and commit Postgres-wire
//          transactions on owned or pooled connections.
// Dependencies: postgres, r2d2, r2d2_postgres, serial-retry-core, thiserror
// ============================================================================

//! ## Overview
//! [`PostgresSession`] issues raw `BEGIN ISOLATION LEVEL SERIALIZABLE`,
//! `SAVEPOINT`, `ROLLBACK TO SAVEPOINT`, `COMMIT`, and `ROLLBACK` statements
//! so the coordinator controls every transaction boundary. A session dropped
//! with an open transaction rolls it back before the connection returns to
//! the pool.

// ============================================================================
// SECTION: Imports
// ============================================================================

use postgres::CancelToken;
use postgres::Client;
use postgres::NoTls;
use r2d2::Pool;
use r2d2::PooledConnection;
use r2d2_postgres::PostgresConnectionManager;
use serial_retry_core::Session;
use serial_retry_core::SessionProvider;
use serial_retry_core::is_valid_savepoint_name;
use thiserror::Error;

use crate::config::PostgresSessionConfig;

/// Connection manager used by the pool.
type Manager = PostgresConnectionManager<NoTls>;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Postgres session errors.
///
/// # Invariants
/// - `Postgres` keeps the driver error as its source so SQLSTATE stays
///   reachable by cause-chain classification.
#[derive(Debug, Error)]
pub enum PostgresSessionError {
    /// Driver or server error.
    #[error("postgres session error: {}", describe_driver_error(.0))]
    Postgres(#[from] postgres::Error),
    /// Connection pool error.
    #[error("postgres pool error: {0}")]
    Pool(#[from] r2d2::Error),
    /// Invalid configuration or argument.
    #[error("postgres session invalid: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Session
// ============================================================================

/// Connection backing a session.
enum Backing {
    /// Connection owned by the session.
    Owned(Client),
    /// Connection checked out from a pool.
    Pooled(PooledConnection<Manager>),
}

/// One Postgres-wire connection driven by the coordinator.
pub struct PostgresSession {
    /// Underlying connection.
    backing: Backing,
    /// True between a successful begin and the matching commit or rollback.
    in_transaction: bool,
}

impl PostgresSession {
    /// Connects a standalone session.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresSessionError`] when the config is invalid or the
    /// connection fails.
    pub fn connect(config: &PostgresSessionConfig) -> Result<Self, PostgresSessionError> {
        let client = config.driver_config()?.connect(NoTls)?;
        Ok(Self::from_client(client))
    }

    /// Wraps an existing client.
    #[must_use]
    pub const fn from_client(client: Client) -> Self {
        Self {
            backing: Backing::Owned(client),
            in_transaction: false,
        }
    }

    /// Returns the client for issuing statements inside a work unit.
    pub fn client(&mut self) -> &mut Client {
        match &mut self.backing {
            Backing::Owned(client) => client,
            Backing::Pooled(pooled) => &mut **pooled,
        }
    }

    /// Returns a token that can cancel the statement currently running on
    /// this connection from another thread.
    pub fn cancel_handle(&mut self) -> CancelToken {
        self.client().cancel_token()
    }

    /// Returns true while a transaction is open.
    #[must_use]
    pub const fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Runs a control statement.
    fn control(&mut self, sql: &str) -> Result<(), PostgresSessionError> {
        self.client().batch_execute(sql)?;
        Ok(())
    }
}

impl Session for PostgresSession {
    type Error = PostgresSessionError;

    fn begin(&mut self) -> Result<(), PostgresSessionError> {
        if self.in_transaction {
            return Err(PostgresSessionError::Invalid("transaction already open".to_string()));
        }
        self.control("BEGIN ISOLATION LEVEL SERIALIZABLE")?;
        self.in_transaction = true;
        Ok(())
    }

    fn savepoint(&mut self, name: &str) -> Result<(), PostgresSessionError> {
        checked_name(name)?;
        self.control(&format!("SAVEPOINT {name}"))
    }

    fn rollback_to_savepoint(&mut self, name: &str) -> Result<(), PostgresSessionError> {
        checked_name(name)?;
        self.control(&format!("ROLLBACK TO SAVEPOINT {name}"))
    }

    fn commit(&mut self) -> Result<(), PostgresSessionError> {
        let result = self.control("COMMIT");
        // A failed COMMIT still ends the transaction server-side.
        self.in_transaction = false;
        result
    }

    fn rollback(&mut self) -> Result<(), PostgresSessionError> {
        if !self.in_transaction {
            return Ok(());
        }
        self.in_transaction = false;
        self.control("ROLLBACK")
    }
}

impl Drop for PostgresSession {
    fn drop(&mut self) {
        if self.in_transaction
            && let Err(err) = self.rollback()
        {
            tracing::warn!(error = %err, "postgres session rollback on drop failed");
        }
    }
}

// ============================================================================
// SECTION: Provider
// ============================================================================

/// Hands out pooled [`PostgresSession`]s.
pub struct PostgresSessionProvider {
    /// Connection pool; taken on drop.
    pool: Option<Pool<Manager>>,
}

impl Drop for PostgresSessionProvider {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            let _ = std::thread::spawn(move || drop(pool));
        }
    }
}

impl PostgresSessionProvider {
    /// Builds the pool and verifies connectivity.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresSessionError`] when the config is invalid or no
    /// connection can be established.
    pub fn new(config: &PostgresSessionConfig) -> Result<Self, PostgresSessionError> {
        config.validate()?;
        let manager = PostgresConnectionManager::new(config.driver_config()?, NoTls);
        let pool = Pool::builder()
            .max_size(config.max_connections)
            .connection_timeout(std::time::Duration::from_millis(config.connect_timeout_ms))
            .build(manager)?;
        Ok(Self {
            pool: Some(pool),
        })
    }

    /// Runs setup SQL (schema creation, seeding) outside the coordinator.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresSessionError`] when checkout or the batch fails.
    pub fn execute_batch(&self, sql: &str) -> Result<(), PostgresSessionError> {
        self.checkout()?.batch_execute(sql)?;
        Ok(())
    }

    /// Checks out a raw pooled connection.
    fn checkout(&self) -> Result<PooledConnection<Manager>, PostgresSessionError> {
        let pool = self
            .pool
            .as_ref()
            .ok_or_else(|| PostgresSessionError::Invalid("postgres provider closed".to_string()))?;
        Ok(pool.get()?)
    }
}

impl SessionProvider for PostgresSessionProvider {
    type Error = PostgresSessionError;
    type Session = PostgresSession;

    fn acquire(&self) -> Result<PostgresSession, PostgresSessionError> {
        Ok(PostgresSession {
            backing: Backing::Pooled(self.checkout()?),
            in_transaction: false,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Turns on `CockroachDB`'s test-only retry error injection for the session:
/// statements inside explicit transactions fail with SQLSTATE `40001` until
/// the transaction has been retried several times.
///
/// # Errors
///
/// Returns [`PostgresSessionError`] when the setting is rejected (for example
/// on `PostgreSQL`, which has no such variable).
pub fn enable_retry_error_injection(
    session: &mut PostgresSession,
) -> Result<(), PostgresSessionError> {
    session.control("SET inject_retry_errors_enabled = 'true'")
}

/// Renders a driver error with the server's SQLSTATE and message; the driver's
/// own display is only `db error` for server failures.
#[must_use]
pub fn describe_driver_error(error: &postgres::Error) -> String {
    match error.as_db_error() {
        Some(db) => format!("{} (sqlstate {})", db.message(), db.code().code()),
        None => error.to_string(),
    }
}

/// Rejects savepoint names that are not plain identifiers.
fn checked_name(name: &str) -> Result<(), PostgresSessionError> {
    if is_valid_savepoint_name(name) {
        Ok(())
    } else {
        Err(PostgresSessionError::Invalid(format!("invalid savepoint name: '{name}'")))
    }
}
