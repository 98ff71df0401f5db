//! Retry, workload, and backend section validation tests.
// crates/serial-retry-config/tests/retry_validation.rs
// =============================================================================
// Module: Retry Config Validation Tests
// Description: Validate [retry], [workload], [postgres], and [sqlite] rules.
// Purpose: Ensure policies built from config match the dialect in use.
// =============================================================================

use serial_retry_config::SerialRetryConfig;
use serial_retry_core::Dialect;
use serial_retry_core::RewindStrategy;

type TestResult = Result<(), String>;

fn assert_rejected(text: &str, needle: &str) -> TestResult {
    match SerialRetryConfig::from_toml_str(text) {
        Err(error) if error.to_string().contains(needle) => Ok(()),
        Err(error) => Err(format!("error {error} did not contain {needle}")),
        Ok(_) => Err(format!("expected rejection for: {text}")),
    }
}

#[test]
fn full_config_builds_cockroach_policy() -> TestResult {
    let config = SerialRetryConfig::from_toml_str(
        r#"
        [retry]
        budget = 7
        dialect = "cockroach"

        [workload]
        workers = 20
        items = 1000
        thread_prefix = "test"

        [postgres]
        connection = "postgresql://root@localhost:26257/defaultdb?sslmode=disable"
        max_connections = 20
        "#,
    )
    .map_err(|err| err.to_string())?;
    let policy = config.policy();
    if policy.budget().get() != 7 || policy.savepoint_name() != "cockroach_restart" {
        return Err(format!("unexpected policy: {}", policy.savepoint_name()));
    }
    if policy.rewind() != RewindStrategy::Savepoint {
        return Err("cockroach rewinds to a savepoint".to_string());
    }
    if !config.catalog().matches("40001") || config.catalog().matches("40P01") {
        return Err("unexpected cockroach catalog".to_string());
    }
    Ok(())
}

#[test]
fn sqlite_policy_restarts_transactions() -> TestResult {
    let config = SerialRetryConfig::from_toml_str("[sqlite]\npath = \"retry.db\"\n")
        .map_err(|err| err.to_string())?;
    let policy = config.retry.policy_for(Dialect::Sqlite);
    if policy.rewind() != RewindStrategy::Restart {
        return Err("sqlite must restart".to_string());
    }
    if !config.retry.catalog_for(Dialect::Sqlite).matches("SQLITE_BUSY_SNAPSHOT") {
        return Err("sqlite catalog must cover busy snapshots".to_string());
    }
    Ok(())
}

#[test]
fn catalog_override_replaces_dialect_defaults() -> TestResult {
    let config = SerialRetryConfig::from_toml_str(
        r#"
        [retry]
        dialect = "postgres"

        [retry.catalog]
        codes = ["40P01"]
        "#,
    )
    .map_err(|err| err.to_string())?;
    let catalog = config.catalog();
    if !catalog.matches("40P01") || catalog.matches("40001") {
        return Err("override must replace defaults".to_string());
    }
    Ok(())
}

#[test]
fn zero_budget_is_rejected() -> TestResult {
    assert_rejected("[retry]\nbudget = 0\n", "config parse error")
}

#[test]
fn oversized_budget_is_rejected() -> TestResult {
    assert_rejected("[retry]\nbudget = 1000000\n", "retry.budget out of range")
}

#[test]
fn empty_catalog_override_is_rejected() -> TestResult {
    assert_rejected("[retry.catalog]\ncodes = []\n", "at least one code or prefix")
}

#[test]
fn empty_catalog_prefix_is_rejected() -> TestResult {
    assert_rejected("[retry.catalog]\nprefixes = [\"\"]\n", "prefixes must be non-empty")
}

#[test]
fn unsafe_savepoint_name_is_rejected() -> TestResult {
    assert_rejected(
        "[retry]\ndialect = \"postgres\"\nsavepoint_name = \"x; DROP TABLE t\"\n",
        "plain sql identifier",
    )
}

#[test]
fn cockroach_requires_restart_savepoint() -> TestResult {
    assert_rejected("[retry]\nsavepoint_name = \"retry_point\"\n", "cockroach_restart")
}

#[test]
fn cockroach_backend_checks_savepoint_even_when_default_dialect_differs() -> TestResult {
    assert_rejected(
        "[retry]\ndialect = \"postgres\"\nsavepoint_name = \"retry_point\"\n\n[postgres]\n\
         dialect = \"cockroach\"\n",
        "cockroach_restart",
    )
}

#[test]
fn sqlite_only_config_accepts_custom_savepoint_name() -> TestResult {
    let config = SerialRetryConfig::from_toml_str(
        "[retry]\nsavepoint_name = \"sp\"\n\n[sqlite]\npath = \"retry.db\"\n",
    )
    .map_err(|err| err.to_string())?;
    if config.active_dialects() != vec![Dialect::Sqlite] {
        return Err("only the sqlite backend is configured".to_string());
    }
    if config.retry.policy_for(Dialect::Sqlite).savepoint_name() != "sp" {
        return Err("savepoint override applies to sqlite".to_string());
    }
    Ok(())
}

#[test]
fn cockroach_backend_next_to_sqlite_still_checks_savepoint() -> TestResult {
    assert_rejected(
        "[retry]\nsavepoint_name = \"sp\"\n\n[sqlite]\npath = \"retry.db\"\n\n[postgres]\n\
         dialect = \"cockroach\"\n",
        "cockroach_restart",
    )
}

#[test]
fn zero_workers_is_rejected() -> TestResult {
    assert_rejected("[workload]\nworkers = 0\n", "workers must be greater than zero")
}

#[test]
fn excessive_workers_are_rejected() -> TestResult {
    assert_rejected("[workload]\nworkers = 100000\n", "workload.workers out of range")
}

#[test]
fn invalid_postgres_section_is_rejected() -> TestResult {
    assert_rejected("[postgres]\nmax_connections = 0\n", "max_connections")
}

#[test]
fn invalid_sqlite_section_is_rejected() -> TestResult {
    assert_rejected("[sqlite]\npath = \"\"\n", "must not be empty")
}

#[test]
fn unknown_fields_are_rejected() -> TestResult {
    assert_rejected("[retry]\nbudgte = 5\n", "config parse error")
}
