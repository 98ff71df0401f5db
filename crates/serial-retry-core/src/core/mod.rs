// crates/serial-retry-core/src/core/mod.rs
// ============================================================================
// Module: Serial Retry Core Types
// Description: Status codes, catalogs, dialects, and error classification.
// Purpose: Group the pure, backend-neutral decision logic.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Pure types with no I/O: the tagged [`status::DbError`], the
//! [`catalog::StatusCodeCatalog`], per-backend [`dialect::Dialect`] defaults,
//! and the [`classifier::ErrorClassifier`].

pub mod catalog;
pub mod classifier;
pub mod dialect;
pub mod status;
