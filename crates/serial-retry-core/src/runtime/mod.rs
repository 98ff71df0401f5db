// crates/serial-retry-core/src/runtime/mod.rs
// ============================================================================
// Module: Serial Retry Runtime
// Description: Retry policy, coordinator, cancellation, and workload driver.
// Purpose: Drive sessions through the bounded retry protocol.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The runtime owns everything that touches a [`crate::Session`]: the
//! [`coordinator::TransactionCoordinator`] for one logical operation and the
//! [`workload::WorkloadDriver`] that runs many of them concurrently.

pub mod cancel;
pub mod coordinator;
pub mod policy;
pub mod workload;
