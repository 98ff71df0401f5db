// crates/serial-retry-core/src/interfaces/mod.rs
// ============================================================================
// Module: Serial Retry Interfaces
// Description: Backend-agnostic session and session-provider contracts.
// Purpose: Define the surfaces the coordinator drives without backend details.
// Dependencies: std
// ============================================================================

//! ## Overview
//! A [`Session`] is one open connection that holds at most one transaction at
//! a time. The coordinator is the only caller of its transaction-control
//! methods for the duration of a retry sequence; work units receive the same
//! session to issue their statements. A [`SessionProvider`] hands out sessions
//! on demand and is shared across worker threads.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::error::Error;

// ============================================================================
// SECTION: Session
// ============================================================================

/// Transaction-control surface of one backend connection.
///
/// # Invariants
/// - At most one transaction is open at a time.
/// - `savepoint`/`rollback_to_savepoint` are only called inside an open
///   transaction; `rollback_to_savepoint` leaves the transaction open.
pub trait Session {
    /// Backend error type for control operations.
    type Error: Error + Send + Sync + 'static;

    /// Opens a transaction at the backend's serializable isolation level.
    ///
    /// # Errors
    ///
    /// Returns [`Session::Error`] when the backend rejects the begin.
    fn begin(&mut self) -> Result<(), Self::Error>;

    /// Establishes a named rollback point inside the open transaction.
    ///
    /// # Errors
    ///
    /// Returns [`Session::Error`] when the savepoint cannot be created.
    fn savepoint(&mut self, name: &str) -> Result<(), Self::Error>;

    /// Rewinds the open transaction to the named rollback point.
    ///
    /// # Errors
    ///
    /// Returns [`Session::Error`] when the rewind fails.
    fn rollback_to_savepoint(&mut self, name: &str) -> Result<(), Self::Error>;

    /// Commits the open transaction.
    ///
    /// # Errors
    ///
    /// Returns [`Session::Error`] when the commit fails.
    fn commit(&mut self) -> Result<(), Self::Error>;

    /// Aborts the open transaction entirely.
    ///
    /// # Errors
    ///
    /// Returns [`Session::Error`] when the rollback fails.
    fn rollback(&mut self) -> Result<(), Self::Error>;
}

// ============================================================================
// SECTION: Session Provider
// ============================================================================

/// Supplies open sessions on demand.
///
/// Providers are shared by reference across worker threads; each acquired
/// session is owned by exactly one logical operation.
pub trait SessionProvider: Sync {
    /// Session type handed out by this provider.
    type Session: Session;
    /// Error raised when no session can be supplied.
    type Error: Error + Send + Sync + 'static;

    /// Acquires an open session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionProvider::Error`] when connecting or checkout fails.
    fn acquire(&self) -> Result<Self::Session, Self::Error>;
}
