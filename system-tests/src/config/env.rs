// system-tests/src/config/env.rs
// ============================================================================
// Module: System Test Environment
// Description: Environment-backed configuration for system tests.
// Purpose: Centralize env parsing with strict UTF-8 validation.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Environment values are parsed with strict UTF-8 enforcement to avoid silent
//! misconfiguration. Invalid UTF-8 fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// SECTION: Environment Constants
// ============================================================================

/// `cockroachdb/cockroach` image tag used when no override is set.
pub const DEFAULT_COCKROACH_TAG: &str = "latest-v21.2";

/// Readiness timeout used when no override is set.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Environment keys for system test configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemTestEnv {
    /// Connection string of an existing `CockroachDB`; skips Docker.
    DatabaseUrl,
    /// `cockroachdb/cockroach` image tag override.
    CockroachTag,
    /// Contention workload worker count (positive integer).
    Workers,
    /// Contention workload item count (positive integer).
    Items,
    /// Readiness timeout override in seconds (positive integer).
    TimeoutSeconds,
}

impl SystemTestEnv {
    /// Returns the canonical environment variable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DatabaseUrl => "SERIAL_RETRY_SYSTEM_PG_URL",
            Self::CockroachTag => "SERIAL_RETRY_SYSTEM_COCKROACH_TAG",
            Self::Workers => "SERIAL_RETRY_SYSTEM_WORKERS",
            Self::Items => "SERIAL_RETRY_SYSTEM_ITEMS",
            Self::TimeoutSeconds => "SERIAL_RETRY_SYSTEM_TIMEOUT_SEC",
        }
    }
}

// ============================================================================
// SECTION: Config Types
// ============================================================================

/// Typed system test configuration derived from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SystemTestConfig {
    /// Existing database connection string.
    pub database_url: Option<String>,
    /// Image tag override.
    pub cockroach_tag: Option<String>,
    /// Worker count override.
    pub workers: Option<usize>,
    /// Item count override.
    pub items: Option<usize>,
    /// Readiness timeout override.
    pub timeout: Option<Duration>,
}

impl SystemTestConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error when an environment value is not valid UTF-8, is empty,
    /// or fails validation (for example, a zero worker count).
    pub fn load() -> Result<Self, String> {
        let database_url = read_env_nonempty(SystemTestEnv::DatabaseUrl.as_str())?;
        let cockroach_tag = read_env_nonempty(SystemTestEnv::CockroachTag.as_str())?;
        let workers = read_env_nonempty(SystemTestEnv::Workers.as_str())?
            .map(|value| parse_positive(SystemTestEnv::Workers.as_str(), &value))
            .transpose()?;
        let items = read_env_nonempty(SystemTestEnv::Items.as_str())?
            .map(|value| parse_positive(SystemTestEnv::Items.as_str(), &value))
            .transpose()?;
        let timeout = read_env_nonempty(SystemTestEnv::TimeoutSeconds.as_str())?
            .map(|value| parse_positive(SystemTestEnv::TimeoutSeconds.as_str(), &value))
            .transpose()?
            .map(|secs| Duration::from_secs(u64::try_from(secs).unwrap_or(u64::MAX)));
        Ok(Self {
            database_url,
            cockroach_tag,
            workers,
            items,
            timeout,
        })
    }

    /// Returns the image tag to start.
    #[must_use]
    pub fn cockroach_tag(&self) -> &str {
        self.cockroach_tag.as_deref().unwrap_or(DEFAULT_COCKROACH_TAG)
    }

    /// Returns the readiness timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_TIMEOUT)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads an environment variable and enforces UTF-8 validity.
///
/// # Errors
///
/// Returns an error when the environment variable contains invalid UTF-8.
pub fn read_env_strict(name: &str) -> Result<Option<String>, String> {
    std::env::var_os(name).map_or(Ok(None), |raw| {
        raw.into_string().map(Some).map_err(|_| format!("{name} must be valid UTF-8"))
    })
}

/// Reads an environment variable and rejects empty values.
///
/// # Errors
///
/// Returns an error when the variable is set but empty or whitespace.
fn read_env_nonempty(name: &str) -> Result<Option<String>, String> {
    match read_env_strict(name)? {
        Some(value) if value.trim().is_empty() => Err(format!("{name} must not be empty")),
        Some(value) => Ok(Some(value)),
        None => Ok(None),
    }
}

/// Parses a positive integer from an environment variable string.
///
/// # Errors
///
/// Returns an error when the value is non-numeric or zero.
fn parse_positive(name: &str, raw: &str) -> Result<usize, String> {
    let value: usize =
        raw.trim().parse().map_err(|_| format!("{name} must be a positive integer"))?;
    if value == 0 {
        return Err(format!("{name} must be greater than zero"));
    }
    Ok(value)
}
