// system-tests/src/lib.rs
// ============================================================================
// Module: Serial Retry System Tests Library
// Description: Shared configuration for system test scenarios.
// Purpose: Provide common utilities for serial-retry system-test binaries.
// Dependencies: std
// ============================================================================

//! ## Overview
//! This crate hosts shared configuration used by the serial-retry
//! system-tests binaries in `system-tests/tests`. The binaries require the
//! `system-tests` feature and either Docker or an existing `CockroachDB`
//! reachable through `SERIAL_RETRY_SYSTEM_PG_URL`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
