// crates/serial-retry-cli/src/stress.rs
// ============================================================================
// Module: Stress Workload
// Description: Shared-table contention workload for both backends.
// Purpose: Drive the worker pool against a live database and verify rows.
// Dependencies: postgres, rusqlite, serial-retry-core, serial-retry-postgres,
//               serial-retry-sqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! Every item deletes and re-inserts one `entities` row for the same account
//! and entity, keyed by a per-item table name. The rows differ but the scans
//! overlap, so concurrent serializable transactions conflict. After the run
//! the row count must equal the number of committed items.

// ============================================================================
// SECTION: Imports
// ============================================================================

use postgres::types::ToSql;
use rusqlite::params;
use serde::Serialize;
use serial_retry_core::Dialect;
use serial_retry_core::RetryPolicy;
use serial_retry_core::SessionProvider;
use serial_retry_core::StatusCodeCatalog;
use serial_retry_core::TransactionCoordinator;
use serial_retry_core::WorkloadConfig;
use serial_retry_core::WorkloadDriver;
use serial_retry_core::WorkloadError;
use serial_retry_core::WorkloadReport;
use serial_retry_postgres::PostgresSession;
use serial_retry_postgres::PostgresSessionConfig;
use serial_retry_postgres::PostgresSessionError;
use serial_retry_postgres::PostgresSessionProvider;
use serial_retry_sqlite::SqliteSession;
use serial_retry_sqlite::SqliteSessionConfig;
use serial_retry_sqlite::SqliteSessionError;
use serial_retry_sqlite::SqliteSessionProvider;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Account owning every entity row.
const ACCOUNT_ID: &str = "a-12345678";
/// Entity shared by every item.
const ENTITY_ID: &str = "c-12345678";
/// Entity kind shared by every item.
const ENTITY_KIND: &str = "TABLE";
/// Schema shared by every item.
const SCHEMA_NAME: &str = "test_schema";

/// Postgres-wire item delete.
const PG_DELETE: &str = "DELETE FROM entities WHERE account_id = $1 AND entity_id = $2 AND \
                         entity_kind = $3 AND schema_name = $4 AND table_name = $5";
/// Postgres-wire item insert.
const PG_INSERT: &str = "INSERT INTO entities (account_id, entity_id, entity_kind, schema_name, \
                         table_name) VALUES ($1, $2, $3, $4, $5)";
/// Postgres-wire row count.
const PG_COUNT: &str = "SELECT count(*) FROM entities WHERE account_id = $1";

/// `SQLite` item delete.
const SQLITE_DELETE: &str = "DELETE FROM entities WHERE account_id = ?1 AND entity_id = ?2 AND \
                             entity_kind = ?3 AND schema_name = ?4 AND table_name = ?5";
/// `SQLite` item insert.
const SQLITE_INSERT: &str = "INSERT INTO entities (account_id, entity_id, entity_kind, \
                             schema_name, table_name) VALUES (?1, ?2, ?3, ?4, ?5)";
/// `SQLite` row count.
const SQLITE_COUNT: &str = "SELECT count(*) FROM entities WHERE account_id = ?1";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Backend a stress run targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Backend {
    /// Postgres wire protocol (`PostgreSQL` or `CockroachDB`).
    Postgres,
    /// Embedded `SQLite`.
    Sqlite,
}

impl Backend {
    /// Returns a stable label for the backend.
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
        }
    }
}

/// Retry settings resolved for one run.
#[derive(Debug, Clone)]
pub(crate) struct RetrySettings {
    /// Dialect the policy and catalog were resolved for.
    pub(crate) dialect: Dialect,
    /// Retry policy.
    pub(crate) policy: RetryPolicy,
    /// Retryable-code catalog.
    pub(crate) catalog: StatusCodeCatalog,
}

/// Result of a stress run.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct StressSummary {
    /// Backend exercised.
    pub(crate) backend: Backend,
    /// Dialect in effect.
    pub(crate) dialect: Dialect,
    /// Attempt budget per item.
    pub(crate) budget: u32,
    /// `entities` rows present after the run.
    pub(crate) rows: u64,
    /// Worker pool report.
    pub(crate) report: WorkloadReport,
}

impl StressSummary {
    /// Returns true when every item committed exactly once.
    pub(crate) fn succeeded(&self) -> bool {
        self.report.all_committed()
            && u64::try_from(self.report.committed).is_ok_and(|committed| committed == self.rows)
    }
}

/// Stress run failures outside of per-item outcomes.
#[derive(Debug, Error)]
pub(crate) enum StressError {
    /// Postgres-wire setup or verification failed.
    #[error(transparent)]
    Postgres(#[from] PostgresSessionError),
    /// `SQLite` setup or verification failed.
    #[error(transparent)]
    Sqlite(#[from] SqliteSessionError),
    /// Worker pool failure.
    #[error(transparent)]
    Workload(#[from] WorkloadError),
    /// Row verification query failed.
    #[error("stress verification failed: {0}")]
    Verify(String),
}

// ============================================================================
// SECTION: Schema
// ============================================================================

/// Returns the setup statements shared by both backends.
///
/// The account row is upserted and the account's entities cleared so repeated
/// runs start from an empty key space. Statements run one at a time so the
/// table exists before rows are written to it.
fn setup_statements() -> [String; 4] {
    [
        "CREATE TABLE IF NOT EXISTS accounts (account_id TEXT PRIMARY KEY)".to_string(),
        "CREATE TABLE IF NOT EXISTS entities (
             account_id TEXT NOT NULL REFERENCES accounts (account_id),
             entity_id TEXT NOT NULL,
             entity_kind TEXT NOT NULL,
             schema_name TEXT NOT NULL,
             table_name TEXT NOT NULL,
             PRIMARY KEY (account_id, entity_id, entity_kind, schema_name, table_name)
         )"
        .to_string(),
        format!(
            "INSERT INTO accounts (account_id) VALUES ('{ACCOUNT_ID}') \
             ON CONFLICT (account_id) DO NOTHING"
        ),
        format!("DELETE FROM entities WHERE account_id = '{ACCOUNT_ID}'"),
    ]
}

/// Returns the per-item table name.
fn table_name(item: usize) -> String {
    format!("table_{item:04}")
}

// ============================================================================
// SECTION: Runners
// ============================================================================

/// Runs the workload against a Postgres-wire backend.
///
/// # Errors
///
/// Returns [`StressError`] when setup, the pool, or verification fails.
pub(crate) fn run_postgres(
    config: &PostgresSessionConfig,
    settings: RetrySettings,
    workload: WorkloadConfig,
) -> Result<StressSummary, StressError> {
    let provider = PostgresSessionProvider::new(config)?;
    for statement in setup_statements() {
        provider.execute_batch(&statement)?;
    }
    let budget = settings.policy.budget().get();
    let coordinator = TransactionCoordinator::new(
        settings.policy,
        serial_retry_postgres::classifier_with_catalog(settings.catalog),
    );
    let driver = WorkloadDriver::new(workload)?;
    let report = driver.run(&provider, &coordinator, replace_entity_postgres)?;

    let mut session = provider.acquire()?;
    let count: i64 = session
        .client()
        .query_one(PG_COUNT, &[&ACCOUNT_ID])
        .and_then(|row| row.try_get(0))
        .map_err(|err| StressError::Verify(err.to_string()))?;
    Ok(StressSummary {
        backend: Backend::Postgres,
        dialect: settings.dialect,
        budget,
        rows: u64::try_from(count).unwrap_or(0),
        report,
    })
}

/// Runs the workload against an `SQLite` database file.
///
/// # Errors
///
/// Returns [`StressError`] when setup, the pool, or verification fails.
pub(crate) fn run_sqlite(
    config: &SqliteSessionConfig,
    settings: RetrySettings,
    workload: WorkloadConfig,
) -> Result<StressSummary, StressError> {
    let provider = SqliteSessionProvider::new(config.clone())?;
    for statement in setup_statements() {
        provider.execute_batch(&statement)?;
    }
    let budget = settings.policy.budget().get();
    let coordinator = TransactionCoordinator::new(
        settings.policy,
        serial_retry_sqlite::classifier_with_catalog(settings.catalog),
    );
    let driver = WorkloadDriver::new(workload)?;
    let report = driver.run(&provider, &coordinator, replace_entity_sqlite)?;

    let session = provider.acquire()?;
    let count: i64 = session
        .connection()
        .query_row(SQLITE_COUNT, params![ACCOUNT_ID], |row| row.get(0))
        .map_err(|err| StressError::Verify(err.to_string()))?;
    Ok(StressSummary {
        backend: Backend::Sqlite,
        dialect: settings.dialect,
        budget,
        rows: u64::try_from(count).unwrap_or(0),
        report,
    })
}

// ============================================================================
// SECTION: Work Units
// ============================================================================

/// Deletes then re-inserts the item's entity row over the Postgres wire.
fn replace_entity_postgres(
    item: usize,
    session: &mut PostgresSession,
) -> Result<u64, postgres::Error> {
    let table = table_name(item);
    let params: [&(dyn ToSql + Sync); 5] =
        [&ACCOUNT_ID, &ENTITY_ID, &ENTITY_KIND, &SCHEMA_NAME, &table];
    let client = session.client();
    client.execute(PG_DELETE, &params)?;
    client.execute(PG_INSERT, &params)
}

/// Deletes then re-inserts the item's entity row in `SQLite`.
fn replace_entity_sqlite(item: usize, session: &mut SqliteSession) -> Result<usize, rusqlite::Error> {
    let table = table_name(item);
    let connection = session.connection();
    connection.execute(
        SQLITE_DELETE,
        params![ACCOUNT_ID, ENTITY_ID, ENTITY_KIND, SCHEMA_NAME, table],
    )?;
    connection.execute(
        SQLITE_INSERT,
        params![ACCOUNT_ID, ENTITY_ID, ENTITY_KIND, SCHEMA_NAME, table],
    )
}
