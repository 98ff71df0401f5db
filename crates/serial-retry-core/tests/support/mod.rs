// crates/serial-retry-core/tests/support/mod.rs
// ============================================================================
// Module: Core Test Support
// Description: Scripted and in-memory sessions for coordinator tests.
// Purpose: Observe every transaction-control call without a live database.
// Dependencies: serial-retry-core
// ============================================================================

//! Shared helpers for serial-retry-core integration tests.

#![allow(dead_code, reason = "Not every test binary uses every helper.")]

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use serial_retry_core::DbError;
use serial_retry_core::Dialect;
use serial_retry_core::ErrorClassifier;
use serial_retry_core::RetryBudget;
use serial_retry_core::RetryPolicy;
use serial_retry_core::Session;
use serial_retry_core::SessionProvider;
use serial_retry_core::TransactionCoordinator;

pub type TestResult = Result<(), String>;

/// Returns `Err(message)` when `condition` is false.
pub fn ensure(condition: bool, message: impl Into<String>) -> TestResult {
    if condition { Ok(()) } else { Err(message.into()) }
}

/// SQLSTATE conflict error as a work unit would see it.
pub fn conflict() -> DbError {
    DbError::new("statement failed").with_source(DbError::with_code("40001", "restart transaction"))
}

/// Coordinator with the `CockroachDB` catalog and the given budget.
pub fn coordinator(budget: u32) -> TransactionCoordinator {
    let budget = RetryBudget::new(budget).unwrap_or_default();
    let policy = RetryPolicy::new(budget).with_savepoint_name("cockroach_restart");
    TransactionCoordinator::new(policy, ErrorClassifier::new(Dialect::Cockroach.default_catalog()))
}

// ============================================================================
// SECTION: Scripted Session
// ============================================================================

/// Transaction-control call observed by [`ScriptedSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Begin,
    Savepoint(String),
    RollbackTo(String),
    Commit,
    Rollback,
}

/// Session that records calls and models statement visibility.
#[derive(Debug, Default)]
pub struct ScriptedSession {
    pub calls: Vec<Call>,
    /// Rows written in the open transaction.
    pub pending: Vec<i64>,
    /// Rows made durable by commit.
    pub committed: Vec<i64>,
    pub in_transaction: bool,
    pub fail_begin: bool,
    pub fail_savepoint: bool,
    pub fail_rewind: bool,
    pub fail_commit: bool,
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: i64) {
        self.pending.push(id);
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls.iter().filter(|seen| *seen == call).count()
    }

    fn control_failure(what: &str) -> DbError {
        DbError::with_code("08006", format!("{what} failed: connection lost"))
    }
}

impl Session for ScriptedSession {
    type Error = DbError;

    fn begin(&mut self) -> Result<(), DbError> {
        self.calls.push(Call::Begin);
        if self.fail_begin {
            return Err(Self::control_failure("begin"));
        }
        self.in_transaction = true;
        Ok(())
    }

    fn savepoint(&mut self, name: &str) -> Result<(), DbError> {
        self.calls.push(Call::Savepoint(name.to_string()));
        if self.fail_savepoint {
            return Err(Self::control_failure("savepoint"));
        }
        Ok(())
    }

    fn rollback_to_savepoint(&mut self, name: &str) -> Result<(), DbError> {
        self.calls.push(Call::RollbackTo(name.to_string()));
        if self.fail_rewind {
            return Err(Self::control_failure("rollback to savepoint"));
        }
        self.pending.clear();
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DbError> {
        self.calls.push(Call::Commit);
        if self.fail_commit {
            return Err(Self::control_failure("commit"));
        }
        self.committed.append(&mut self.pending);
        self.in_transaction = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DbError> {
        self.calls.push(Call::Rollback);
        self.pending.clear();
        self.in_transaction = false;
        Ok(())
    }
}

// ============================================================================
// SECTION: In-Memory Contention Backend
// ============================================================================

/// Shared rows plus row locks held by open transactions.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    pub rows: BTreeMap<u64, u64>,
    locks: HashMap<u64, u64>,
}

/// Provider handing out sessions over one shared [`MemoryDatabase`].
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    pub database: Arc<Mutex<MemoryDatabase>>,
    next_session: Arc<AtomicU64>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> Result<u64, String> {
        let guard = self.database.lock().map_err(|_| "database mutex poisoned".to_string())?;
        Ok(guard.rows.values().sum())
    }
}

impl SessionProvider for MemoryProvider {
    type Error = DbError;
    type Session = MemorySession;

    fn acquire(&self) -> Result<MemorySession, DbError> {
        Ok(MemorySession {
            id: self.next_session.fetch_add(1, Ordering::Relaxed),
            database: Arc::clone(&self.database),
            pending: BTreeMap::new(),
            held: Vec::new(),
        })
    }
}

/// Session with first-writer-wins row locking.
#[derive(Debug)]
pub struct MemorySession {
    id: u64,
    database: Arc<Mutex<MemoryDatabase>>,
    pending: BTreeMap<u64, u64>,
    held: Vec<u64>,
}

impl MemorySession {
    /// Increments `key`, failing with SQLSTATE 40001 when another open
    /// transaction holds the row.
    pub fn increment(&mut self, key: u64) -> Result<(), DbError> {
        let mut guard = self.database.lock().map_err(|_| DbError::new("database mutex poisoned"))?;
        match guard.locks.get(&key) {
            Some(owner) if *owner != self.id => {
                return Err(DbError::with_code("40001", format!("write conflict on key {key}")));
            }
            Some(_) => {}
            None => {
                guard.locks.insert(key, self.id);
                self.held.push(key);
            }
        }
        *self.pending.entry(key).or_insert(0) += 1;
        Ok(())
    }

    fn release_locks(&mut self) -> Result<(), DbError> {
        let mut guard = self.database.lock().map_err(|_| DbError::new("database mutex poisoned"))?;
        for key in self.held.drain(..) {
            guard.locks.remove(&key);
        }
        self.pending.clear();
        Ok(())
    }
}

impl Session for MemorySession {
    type Error = DbError;

    fn begin(&mut self) -> Result<(), DbError> {
        Ok(())
    }

    fn savepoint(&mut self, _name: &str) -> Result<(), DbError> {
        Ok(())
    }

    fn rollback_to_savepoint(&mut self, _name: &str) -> Result<(), DbError> {
        self.release_locks()
    }

    fn commit(&mut self) -> Result<(), DbError> {
        {
            let mut guard =
                self.database.lock().map_err(|_| DbError::new("database mutex poisoned"))?;
            for (key, delta) in &self.pending {
                *guard.rows.entry(*key).or_insert(0) += delta;
            }
        }
        self.release_locks()
    }

    fn rollback(&mut self) -> Result<(), DbError> {
        self.release_locks()
    }
}
