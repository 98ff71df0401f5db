// crates/serial-retry-postgres/src/lib.rs
// ============================================================================
// Module: Serial Retry Postgres Adapter
// Description: Postgres-wire sessions, pooled providers, and SQLSTATE probes.
// Purpose: Run coordinator-managed transactions against PostgreSQL and
//          CockroachDB.
// Dependencies: postgres, r2d2, r2d2_postgres, serial-retry-core, serde
// ============================================================================

//! ## Overview
//! Both backends abort conflicting `SERIALIZABLE` transactions with SQLSTATE
//! `40001`. `CockroachDB` additionally honors the `cockroach_restart`
//! savepoint, which lets a client retry inside the same transaction and keep
//! its priority. [`PostgresProbe`] reads SQLSTATE from driver errors so the
//! core classifier can see it anywhere in a cause chain.

pub mod config;
pub mod probe;
pub mod session;

pub use config::PostgresSessionConfig;
pub use probe::PostgresProbe;
pub use probe::classifier;
pub use probe::classifier_with_catalog;
pub use session::PostgresSession;
pub use session::PostgresSessionError;
pub use session::PostgresSessionProvider;
pub use session::describe_driver_error;
pub use session::enable_retry_error_injection;
