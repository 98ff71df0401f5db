// crates/serial-retry-config/src/config.rs
// ============================================================================
// Module: Serial Retry Configuration
// Description: Configuration loading and validation for serial-retry.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: serial-retry-core, serial-retry-postgres, serial-retry-sqlite,
//               serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section is optional; missing sections fall back to defaults, and the
//! backend sections are only required by the commands that use them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serial_retry_core::COCKROACH_RESTART_SAVEPOINT;
use serial_retry_core::Dialect;
use serial_retry_core::RetryBudget;
use serial_retry_core::RetryPolicy;
use serial_retry_core::RewindStrategy;
use serial_retry_core::StatusCodeCatalog;
use serial_retry_core::WorkloadConfig;
use serial_retry_core::is_valid_savepoint_name;
use serial_retry_postgres::PostgresSessionConfig;
use serial_retry_sqlite::SqliteSessionConfig;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "serial-retry.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "SERIAL_RETRY_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum attempt budget accepted from configuration.
pub const MAX_RETRY_BUDGET: u32 = 10_000;
/// Maximum worker threads accepted from configuration.
pub const MAX_WORKERS: usize = 256;
/// Maximum catalog entries (codes plus prefixes).
const MAX_CATALOG_ENTRIES: usize = 64;

// ============================================================================
// SECTION: Config Root
// ============================================================================

/// Root configuration for serial-retry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SerialRetryConfig {
    /// Retry policy configuration.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Worker pool configuration.
    #[serde(default)]
    pub workload: WorkloadConfig,
    /// Postgres-wire backend configuration.
    #[serde(default)]
    pub postgres: Option<PostgresSessionConfig>,
    /// `SQLite` backend configuration.
    #[serde(default)]
    pub sqlite: Option<SqliteSessionConfig>,
}

impl SerialRetryConfig {
    /// Loads configuration from disk using the default resolution rules:
    /// explicit path, then [`CONFIG_ENV_VAR`], then `serial-retry.toml`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Loads configuration like [`Self::load`], but returns validated
    /// defaults when no path is given, [`CONFIG_ENV_VAR`] is unset, and no
    /// `serial-retry.toml` exists in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a resolved file fails to load.
    pub fn load_optional(path: Option<&Path>) -> Result<Self, ConfigError> {
        if path.is_none()
            && env::var_os(CONFIG_ENV_VAR).is_none()
            && !Path::new(DEFAULT_CONFIG_NAME).exists()
        {
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }
        Self::load(path)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.workload.validate().map_err(|err| ConfigError::Invalid(err.to_string()))?;
        if self.workload.workers > MAX_WORKERS {
            return Err(ConfigError::Invalid(format!(
                "workload.workers out of range: {} (max {MAX_WORKERS})",
                self.workload.workers
            )));
        }
        if let Some(postgres) = &self.postgres {
            postgres.validate().map_err(|err| ConfigError::Invalid(err.to_string()))?;
        }
        if let Some(sqlite) = &self.sqlite {
            sqlite.validate().map_err(|err| ConfigError::Invalid(err.to_string()))?;
        }
        for dialect in self.active_dialects() {
            self.retry.validate(dialect)?;
        }
        Ok(())
    }

    /// Returns the dialects the `[retry]` section applies to: one per
    /// configured backend section, or `retry.dialect` when none is present.
    #[must_use]
    pub fn active_dialects(&self) -> Vec<Dialect> {
        let mut dialects = Vec::with_capacity(2);
        if let Some(postgres) = &self.postgres {
            dialects.push(postgres.dialect);
        }
        if self.sqlite.is_some() {
            dialects.push(Dialect::Sqlite);
        }
        if dialects.is_empty() {
            dialects.push(self.retry.dialect);
        }
        dialects
    }

    /// Returns the retry policy for the configured default dialect.
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.retry.policy_for(self.retry.dialect)
    }

    /// Returns the retryable-code catalog for the configured default dialect.
    #[must_use]
    pub fn catalog(&self) -> StatusCodeCatalog {
        self.retry.catalog_for(self.retry.dialect)
    }
}

// ============================================================================
// SECTION: Retry
// ============================================================================

/// `[retry]` section.
///
/// # Invariants
/// - Unset `rewind` and `savepoint_name` follow the dialect in use.
/// - A `catalog` override replaces the dialect catalog entirely.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Total attempts per logical operation.
    #[serde(default)]
    pub budget: RetryBudget,
    /// Default backend dialect.
    #[serde(default)]
    pub dialect: Dialect,
    /// Rewind strategy override.
    #[serde(default)]
    pub rewind: Option<RewindStrategy>,
    /// Rollback point name override.
    #[serde(default)]
    pub savepoint_name: Option<String>,
    /// Retryable-code catalog override.
    #[serde(default)]
    pub catalog: Option<StatusCodeCatalog>,
}

impl RetryConfig {
    /// Returns the retry policy for `dialect` with overrides applied.
    #[must_use]
    pub fn policy_for(&self, dialect: Dialect) -> RetryPolicy {
        let policy = dialect.default_policy(self.budget);
        let policy = match self.rewind {
            Some(rewind) => policy.with_rewind(rewind),
            None => policy,
        };
        match &self.savepoint_name {
            Some(name) => policy.with_savepoint_name(name.clone()),
            None => policy,
        }
    }

    /// Returns the catalog for `dialect`, or the override when present.
    #[must_use]
    pub fn catalog_for(&self, dialect: Dialect) -> StatusCodeCatalog {
        self.catalog.clone().unwrap_or_else(|| dialect.default_catalog())
    }

    /// Validates the section as it applies to `dialect`.
    fn validate(&self, dialect: Dialect) -> Result<(), ConfigError> {
        if self.budget.get() > MAX_RETRY_BUDGET {
            return Err(ConfigError::Invalid(format!(
                "retry.budget out of range: {} (max {MAX_RETRY_BUDGET})",
                self.budget
            )));
        }
        if let Some(name) = &self.savepoint_name
            && !is_valid_savepoint_name(name)
        {
            return Err(ConfigError::Invalid(
                "retry.savepoint_name must be a plain sql identifier".to_string(),
            ));
        }
        let policy = self.policy_for(dialect);
        if dialect == Dialect::Cockroach
            && policy.rewind() == RewindStrategy::Savepoint
            && policy.savepoint_name() != COCKROACH_RESTART_SAVEPOINT
        {
            return Err(ConfigError::Invalid(format!(
                "cockroach savepoint retries require retry.savepoint_name = \
                 \"{COCKROACH_RESTART_SAVEPOINT}\""
            )));
        }
        if let Some(catalog) = &self.catalog {
            if catalog.is_empty() {
                return Err(ConfigError::Invalid(
                    "retry.catalog must list at least one code or prefix".to_string(),
                ));
            }
            let entries = catalog.codes().count() + catalog.prefixes().count();
            if entries > MAX_CATALOG_ENTRIES {
                return Err(ConfigError::Invalid(format!(
                    "retry.catalog has too many entries: {entries} (max {MAX_CATALOG_ENTRIES})"
                )));
            }
            if catalog.prefixes().any(str::is_empty) {
                return Err(ConfigError::Invalid(
                    "retry.catalog prefixes must be non-empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}
