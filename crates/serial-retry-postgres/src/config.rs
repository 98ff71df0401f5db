// crates/serial-retry-postgres/src/config.rs
// ============================================================================
// Module: Postgres Session Config
// Description: Connection and pool settings for Postgres-wire backends.
// Purpose: Describe how sessions connect and which dialect they speak.
// Dependencies: postgres, serde, serial-retry-core
// ============================================================================

//! ## Overview
//! [`PostgresSessionConfig`] is deserialized from the `[postgres]` section
//! and validated before a pool is built. The same config drives
//! `PostgreSQL` and `CockroachDB`; `dialect` picks the retry defaults.

use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use serial_retry_core::Dialect;

use crate::session::PostgresSessionError;

/// Maximum pool size accepted by validation.
const MAX_CONNECTIONS: u32 = 1_024;

/// Postgres-wire session configuration.
///
/// # Invariants
/// - `dialect` is [`Dialect::Postgres`] or [`Dialect::Cockroach`].
/// - Timeouts are interpreted as milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PostgresSessionConfig {
    /// Postgres connection string.
    #[serde(default = "default_connection")]
    pub connection: String,
    /// Maximum pool size.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Optional server-side statement timeout in milliseconds.
    #[serde(default)]
    pub statement_timeout_ms: Option<u64>,
    /// Backend dialect.
    #[serde(default)]
    pub dialect: Dialect,
}

/// Returns the default connection string (local insecure `CockroachDB` node).
fn default_connection() -> String {
    "postgresql://root@localhost:26257/defaultdb?sslmode=disable".to_string()
}

/// Returns the default pool size.
const fn default_max_connections() -> u32 {
    20
}

/// Returns the default connect timeout.
const fn default_connect_timeout_ms() -> u64 {
    5_000
}

impl Default for PostgresSessionConfig {
    fn default() -> Self {
        Self {
            connection: default_connection(),
            max_connections: default_max_connections(),
            connect_timeout_ms: default_connect_timeout_ms(),
            statement_timeout_ms: None,
            dialect: Dialect::default(),
        }
    }
}

impl PostgresSessionConfig {
    /// Validates limits and the connection string.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresSessionError::Invalid`] when the config is unusable.
    pub fn validate(&self) -> Result<(), PostgresSessionError> {
        if self.dialect == Dialect::Sqlite {
            return Err(PostgresSessionError::Invalid(
                "postgres sessions require the postgres or cockroach dialect".to_string(),
            ));
        }
        if self.max_connections == 0 || self.max_connections > MAX_CONNECTIONS {
            return Err(PostgresSessionError::Invalid(format!(
                "max_connections out of range: {} (max {MAX_CONNECTIONS})",
                self.max_connections
            )));
        }
        if self.connect_timeout_ms == 0 {
            return Err(PostgresSessionError::Invalid(
                "connect_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.statement_timeout_ms == Some(0) {
            return Err(PostgresSessionError::Invalid(
                "statement_timeout_ms must be greater than zero".to_string(),
            ));
        }
        self.driver_config().map(|_| ())
    }

    /// Builds the driver config with timeouts applied.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresSessionError::Invalid`] when the connection string
    /// cannot be parsed.
    pub fn driver_config(&self) -> Result<postgres::Config, PostgresSessionError> {
        let mut config = self
            .connection
            .parse::<postgres::Config>()
            .map_err(|err| PostgresSessionError::Invalid(format!("connection string: {err}")))?;
        config.connect_timeout(Duration::from_millis(self.connect_timeout_ms));
        if let Some(timeout) = self.statement_timeout_ms {
            config.options(&format!("-c statement_timeout={timeout}"));
        }
        Ok(config)
    }
}
