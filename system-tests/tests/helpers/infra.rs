// system-tests/tests/helpers/infra.rs
// ============================================================================
// Module: System Test Infrastructure
// Description: CockroachDB fixtures for serial-retry system-tests.
// Purpose: Provide an isolated single-node cluster for retry coverage.
// Dependencies: postgres, testcontainers
// ============================================================================

//! ## Overview
//! Starts `cockroachdb/cockroach` in insecure single-node mode, or reuses the
//! cluster named by `SERIAL_RETRY_SYSTEM_PG_URL`.

use std::process::Command;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use serial_retry_postgres::PostgresSessionConfig;
use system_tests::config::SystemTestConfig;
use testcontainers::Container;
use testcontainers::GenericImage;
use testcontainers::ImageExt;
use testcontainers::core::IntoContainerPort;
use testcontainers::runners::SyncRunner;

/// SQL port exposed by the cockroach image.
const COCKROACH_SQL_PORT: u16 = 26257;

pub struct CockroachFixture {
    pub url: String,
    pub config: SystemTestConfig,
    _container: Option<Container<GenericImage>>,
}

impl CockroachFixture {
    pub fn start() -> Result<Self, String> {
        let config = SystemTestConfig::load()?;
        if let Some(url) = config.database_url.clone() {
            let fixture = Self {
                url,
                config,
                _container: None,
            };
            wait_for_cockroach_blocking(&fixture.url, fixture.config.timeout())?;
            return Ok(fixture);
        }

        ensure_docker_available()?;
        let args = vec!["start-single-node".to_string(), "--insecure".to_string()];
        let container = GenericImage::new("cockroachdb/cockroach", config.cockroach_tag())
            .with_exposed_port(COCKROACH_SQL_PORT.tcp())
            .with_cmd(args)
            .start()
            .map_err(|err| format!("failed to start cockroach container: {err}"))?;
        let port = container
            .get_host_port_ipv4(COCKROACH_SQL_PORT.tcp())
            .map_err(|err| format!("failed to resolve cockroach port: {err}"))?;
        let url = format!("postgresql://root@127.0.0.1:{port}/defaultdb?sslmode=disable");
        let fixture = Self {
            url,
            config,
            _container: Some(container),
        };
        wait_for_cockroach_blocking(&fixture.url, fixture.config.timeout())?;
        Ok(fixture)
    }

    /// Session configuration for this cluster with the cockroach dialect.
    pub fn session_config(&self, max_connections: u32) -> PostgresSessionConfig {
        PostgresSessionConfig {
            connection: self.url.clone(),
            max_connections,
            ..PostgresSessionConfig::default()
        }
    }

    /// Opens a plain driver connection outside any retry machinery.
    pub fn client(&self) -> Result<postgres::Client, String> {
        postgres::Client::connect(&self.url, postgres::NoTls)
            .map_err(|err| format!("failed to connect to cockroach: {err}"))
    }
}

/// Polls `SELECT 1` until the cluster answers or `timeout` expires.
pub fn wait_for_cockroach_blocking(url: &str, timeout: Duration) -> Result<(), String> {
    let start = Instant::now();
    let mut attempts = 0u32;
    let mut last_error = "unknown error".to_string();
    loop {
        attempts = attempts.saturating_add(1);
        if start.elapsed() > timeout {
            return Err(format!(
                "cockroach readiness timeout after {attempts} attempts: {last_error}"
            ));
        }
        match postgres::Client::connect(url, postgres::NoTls) {
            Ok(mut client) => match client.simple_query("SELECT 1") {
                Ok(_) => return Ok(()),
                Err(err) => {
                    last_error = err.to_string();
                }
            },
            Err(err) => {
                last_error = err.to_string();
            }
        }
        thread::sleep(Duration::from_millis(250));
    }
}

fn ensure_docker_available() -> Result<(), String> {
    let output = Command::new("docker")
        .arg("info")
        .output()
        .map_err(|err| format!("docker info failed: {err}"))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("docker info failed: {stderr}"));
    }
    Ok(())
}
