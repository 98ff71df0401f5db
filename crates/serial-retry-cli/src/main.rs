// crates/serial-retry-cli/src/main.rs
// ============================================================================
// Module: Serial Retry CLI Entry Point
// Description: Command dispatcher for contention stress runs and config checks.
// Purpose: Exercise the retry coordinator against live backends from a shell.
// Dependencies: clap, serial-retry-config, serial-retry-core, serde_json,
//               thiserror, tracing-subscriber
// ============================================================================

//! ## Overview
//! `serial-retry stress` runs the worker pool against a shared `entities`
//! table on a Postgres-wire or `SQLite` backend and reports per-item outcomes.
//! The exit code is non-zero unless every item committed exactly once.
//! `serial-retry config check` loads and validates a configuration file.
//! Diagnostics go to stderr through `tracing`; filter with `RUST_LOG`.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod stress;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use serial_retry_config::SerialRetryConfig;
use serial_retry_core::Dialect;
use serial_retry_core::RetryBudget;
use serial_retry_core::WorkloadConfig;
use serial_retry_postgres::PostgresSessionConfig;
use serial_retry_sqlite::SqliteSessionConfig;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::stress::Backend;
use crate::stress::RetrySettings;
use crate::stress::StressSummary;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Log filter used when `RUST_LOG` is unset or invalid.
const DEFAULT_LOG_FILTER: &str = "warn";

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "serial-retry", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a contention workload against a live backend.
    Stress(StressCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a serial-retry configuration file.
    Check(ConfigCheckCommand),
}

/// Arguments for config validation.
#[derive(Args, Debug)]
struct ConfigCheckCommand {
    /// Optional config file path (defaults to serial-retry.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Backend selector for `stress`.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum BackendArg {
    /// Postgres wire protocol (`PostgreSQL` or `CockroachDB`).
    Postgres,
    /// Embedded `SQLite` database file.
    Sqlite,
}

impl From<BackendArg> for Backend {
    fn from(value: BackendArg) -> Self {
        match value {
            BackendArg::Postgres => Self::Postgres,
            BackendArg::Sqlite => Self::Sqlite,
        }
    }
}

/// Report output format.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Human-readable summary lines.
    Text,
    /// Full JSON report including per-item outcomes.
    Json,
}

/// Arguments for `stress`.
#[derive(Args, Debug)]
struct StressCommand {
    /// Backend to exercise.
    #[arg(long, value_enum)]
    backend: BackendArg,
    /// Optional config file path (defaults to serial-retry.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Postgres connection string (overrides `[postgres].connection`).
    #[arg(long, value_name = "URL")]
    connection: Option<String>,
    /// `SQLite` database file (overrides `[sqlite].path`).
    #[arg(long, value_name = "FILE")]
    path: Option<PathBuf>,
    /// Worker thread count (overrides `[workload].workers`).
    #[arg(long, value_name = "N")]
    workers: Option<usize>,
    /// Item count (overrides `[workload].items`).
    #[arg(long, value_name = "N")]
    items: Option<usize>,
    /// Attempts per item (overrides `[retry].budget`).
    #[arg(long, value_name = "N")]
    budget: Option<u32>,
    /// Report format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

/// Backend connection settings resolved for a stress run.
#[derive(Debug, Clone)]
enum StressTarget {
    /// Postgres-wire backend.
    Postgres(PostgresSessionConfig),
    /// `SQLite` backend.
    Sqlite(SqliteSessionConfig),
}

impl StressTarget {
    /// Returns the dialect whose defaults apply to this backend.
    const fn dialect(&self) -> Dialect {
        match self {
            Self::Postgres(config) => config.dialect,
            Self::Sqlite(_) => Dialect::Sqlite,
        }
    }
}

/// Fully resolved stress run inputs.
#[derive(Debug, Clone)]
struct StressPlan {
    /// Backend connection settings.
    target: StressTarget,
    /// Retry policy and catalog.
    settings: RetrySettings,
    /// Worker pool sizing.
    workload: WorkloadConfig,
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    init_tracing();
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();

    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&format!("serial-retry {version}"))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    match command {
        Commands::Stress(command) => command_stress(&command),
        Commands::Config {
            command,
        } => command_config(command),
    }
}

/// Installs the stderr tracing subscriber.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

/// Emits the top-level help message for the CLI.
fn show_help() -> CliResult<()> {
    let mut command = Cli::command();
    command.print_help().map_err(|err| CliError::new(output_error("stdout", &err)))?;
    write_stdout_line("").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(())
}

// ============================================================================
// SECTION: Stress Command
// ============================================================================

/// Executes the `stress` command.
fn command_stress(command: &StressCommand) -> CliResult<ExitCode> {
    let config = SerialRetryConfig::load_optional(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    let plan = plan_stress(command, config)?;
    tracing::info!(
        backend = Backend::from(command.backend).as_str(),
        dialect = plan.settings.dialect.as_str(),
        workers = plan.workload.workers,
        items = plan.workload.items,
        budget = plan.settings.policy.budget().get(),
        "starting stress run"
    );
    let summary = match plan.target {
        StressTarget::Postgres(config) => {
            stress::run_postgres(&config, plan.settings, plan.workload)
        }
        StressTarget::Sqlite(config) => stress::run_sqlite(&config, plan.settings, plan.workload),
    }
    .map_err(|err| CliError::new(format!("stress run failed: {err}")))?;

    match command.format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&summary)
                .map_err(|err| CliError::new(format!("failed to serialize report: {err}")))?;
            write_stdout_line(&json).map_err(|err| CliError::new(output_error("stdout", &err)))?;
        }
        OutputFormat::Text => {
            for line in summary_lines(&summary) {
                write_stdout_line(&line)
                    .map_err(|err| CliError::new(output_error("stdout", &err)))?;
            }
        }
    }
    Ok(if summary.succeeded() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Applies command-line overrides to `config` and resolves the run inputs.
fn plan_stress(command: &StressCommand, mut config: SerialRetryConfig) -> CliResult<StressPlan> {
    if let Some(budget) = command.budget {
        config.retry.budget = RetryBudget::new(budget)
            .ok_or_else(|| CliError::new("--budget must be greater than zero".to_string()))?;
    }
    if let Some(workers) = command.workers {
        config.workload.workers = workers;
    }
    if let Some(items) = command.items {
        config.workload.items = items;
    }
    let target = match command.backend {
        BackendArg::Postgres => {
            if command.path.is_some() {
                return Err(CliError::new("--path applies only to the sqlite backend".to_string()));
            }
            let mut postgres = config.postgres.clone().unwrap_or_default();
            if let Some(connection) = &command.connection {
                postgres.connection.clone_from(connection);
            }
            config.postgres = Some(postgres.clone());
            StressTarget::Postgres(postgres)
        }
        BackendArg::Sqlite => {
            if command.connection.is_some() {
                return Err(CliError::new(
                    "--connection applies only to the postgres backend".to_string(),
                ));
            }
            let sqlite = match (&command.path, config.sqlite.clone()) {
                (Some(path), Some(mut sqlite)) => {
                    sqlite.path.clone_from(path);
                    sqlite
                }
                (Some(path), None) => SqliteSessionConfig::new(path.clone()),
                (None, Some(sqlite)) => sqlite,
                (None, None) => {
                    return Err(CliError::new(
                        "sqlite backend requires --path or a [sqlite] config section".to_string(),
                    ));
                }
            };
            config.sqlite = Some(sqlite.clone());
            StressTarget::Sqlite(sqlite)
        }
    };
    config.validate().map_err(|err| CliError::new(err.to_string()))?;

    let dialect = target.dialect();
    Ok(StressPlan {
        target,
        settings: RetrySettings {
            dialect,
            policy: config.retry.policy_for(dialect),
            catalog: config.retry.catalog_for(dialect),
        },
        workload: config.workload,
    })
}

/// Renders the text report.
fn summary_lines(summary: &StressSummary) -> Vec<String> {
    let report = &summary.report;
    let mut lines = vec![
        format!(
            "backend: {} (dialect {}, budget {})",
            summary.backend.as_str(),
            summary.dialect,
            summary.budget
        ),
        format!(
            "items: {} committed, {} exhausted, {} fatal, {} control, {} acquire failed",
            report.committed, report.exhausted, report.fatal, report.control, report.acquire_failed
        ),
        format!("retries: {} total, {} max per item", report.total_retries, report.max_retries),
        format!("rows: {}", summary.rows),
        format!("elapsed: {} ms", report.elapsed_ms),
    ];
    for outcome in &report.items {
        if let Some(error) = &outcome.error {
            lines.push(format!("item {} on {}: {error}", outcome.item, outcome.worker));
        }
    }
    let result = if summary.succeeded() { "ok" } else { "failed" };
    lines.push(format!("result: {result}"));
    lines
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Check(command) => command_config_check(&command),
    }
}

/// Executes the config check command.
fn command_config_check(command: &ConfigCheckCommand) -> CliResult<ExitCode> {
    let config = SerialRetryConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    let policy = config.policy();
    write_stdout_line(&format!(
        "config ok (dialect {}, budget {}, rewind {})",
        config.retry.dialect,
        policy.budget(),
        policy.rewind().as_str()
    ))
    .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
