// system-tests/tests/helpers/mod.rs
// ============================================================================
// Module: System Test Helpers
// Description: Shared helpers for serial-retry system-tests.
// Purpose: Provide database fixtures and the shared contention schema.
// Dependencies: system-tests, serial-retry-postgres, testcontainers
// ============================================================================

//! ## Overview
//! Shared helpers for serial-retry system-tests.
//! Invariants:
//! - Every fixture either reuses `SERIAL_RETRY_SYSTEM_PG_URL` or owns a
//!   container that lives as long as the fixture.
//! - Helpers return `Result<_, String>` and never panic.

#![allow(dead_code, reason = "Shared helpers are reused across multiple test suites.")]

pub mod entities;
pub mod infra;
