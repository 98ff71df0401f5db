// crates/serial-retry-core/src/runtime/cancel.rs
// ============================================================================
// Module: Cancellation Flag
// Description: Shared cancellation signal observed by coordinators.
// Purpose: Let callers stop retry loops without leaving transactions open.
// Dependencies: std
// ============================================================================

//! ## Overview
//! [`CancelFlag`] is a cloneable, thread-safe boolean. Coordinators check it
//! before each attempt and after each attempt, including right before commit. Interrupting a call that
//! is already blocked inside the backend is the backend adapter's job (for
//! example a Postgres cancel token); the flag then turns the resulting error
//! into a cancellation instead of a retry.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

/// Shared cancellation signal.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    /// Set once cancellation is requested; never cleared.
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    /// Creates an unset flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation for every holder of this flag.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns true once cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
