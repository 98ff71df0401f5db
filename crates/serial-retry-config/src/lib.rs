// crates/serial-retry-config/src/lib.rs
// ============================================================================
// Module: Serial Retry Config Library
// Description: Canonical config model and validation for serial-retry.toml.
// Purpose: Single source of truth for retry, workload, and backend settings.
// Dependencies: serial-retry-core, serial-retry-postgres, serial-retry-sqlite,
//               serde, toml
// ============================================================================

//! ## Overview
//! `serial-retry-config` loads `serial-retry.toml` under strict size and path
//! limits and fails closed on anything it cannot validate. The loaded config
//! builds the core [`serial_retry_core::RetryPolicy`] and
//! [`serial_retry_core::StatusCodeCatalog`] for a dialect.

pub mod config;

pub use config::*;
