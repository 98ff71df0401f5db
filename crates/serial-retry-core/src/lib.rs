// crates/serial-retry-core/src/lib.rs
// ============================================================================
// Module: Serial Retry Core
// Description: Client-side retry protocol for serializable SQL transactions.
// Purpose: Classify conflicts, rewind, and retry work units under a budget.
// Dependencies: serde, thiserror, tracing
// ============================================================================

//! ## Overview
//! Serializable backends abort transactions that cannot be ordered; the client
//! is expected to retry. This crate provides:
//! - [`ErrorClassifier`]: walks an error's cause chain for a retryable status
//!   code drawn from a configurable [`StatusCodeCatalog`];
//! - [`TransactionCoordinator`]: begin, rollback point, bounded re-execution,
//!   commit, over any [`Session`];
//! - [`WorkloadDriver`]: a fixed-size worker pool that pushes independent
//!   items through a coordinator to verify convergence under contention.
//!
//! Backend adapters live in separate crates and implement [`Session`],
//! [`SessionProvider`], and [`StatusCodeProbe`].

pub mod core;
pub mod interfaces;
pub mod runtime;

pub use crate::core::catalog::StatusCodeCatalog;
pub use crate::core::classifier::DbErrorProbe;
pub use crate::core::classifier::ErrorClassifier;
pub use crate::core::classifier::StatusCodeProbe;
pub use crate::core::dialect::COCKROACH_RESTART_SAVEPOINT;
pub use crate::core::dialect::DEFAULT_SAVEPOINT;
pub use crate::core::dialect::Dialect;
pub use crate::core::status::BoxError;
pub use crate::core::status::DbError;
pub use crate::core::status::StatusCode;
pub use crate::interfaces::Session;
pub use crate::interfaces::SessionProvider;
pub use crate::runtime::cancel::CancelFlag;
pub use crate::runtime::coordinator::Committed;
pub use crate::runtime::coordinator::ControlPhase;
pub use crate::runtime::coordinator::RetryError;
pub use crate::runtime::coordinator::TransactionCoordinator;
pub use crate::runtime::policy::RetryBudget;
pub use crate::runtime::policy::RetryPolicy;
pub use crate::runtime::policy::RewindStrategy;
pub use crate::runtime::policy::is_valid_savepoint_name;
pub use crate::runtime::workload::ItemOutcome;
pub use crate::runtime::workload::ItemStatus;
pub use crate::runtime::workload::WorkloadConfig;
pub use crate::runtime::workload::WorkloadDriver;
pub use crate::runtime::workload::WorkloadError;
pub use crate::runtime::workload::WorkloadReport;
