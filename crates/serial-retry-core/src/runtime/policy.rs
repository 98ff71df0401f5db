// crates/serial-retry-core/src/runtime/policy.rs
// ============================================================================
// Module: Retry Policy
// Description: Attempt budget, rewind strategy, and rollback point naming.
// Purpose: Carry the single authoritative retry budget for one coordinator.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`RetryPolicy`] bounds how many times a work unit may run and how the
//! transaction is rewound between attempts. The budget counts total attempts,
//! so a budget of one means "no retries".

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::num::NonZeroU32;

use serde::Deserialize;
use serde::Serialize;

use crate::core::dialect::DEFAULT_SAVEPOINT;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default total attempts per logical operation.
pub const DEFAULT_RETRY_BUDGET: u32 = 5;
/// Maximum length of a rollback point name.
pub const MAX_SAVEPOINT_NAME_LENGTH: usize = 63;

// ============================================================================
// SECTION: Budget
// ============================================================================

/// Maximum number of work-unit executions for one logical operation.
///
/// # Invariants
/// - Always >= 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RetryBudget(NonZeroU32);

impl RetryBudget {
    /// Creates a budget from a raw attempt count (returns `None` if zero).
    #[must_use]
    pub const fn new(attempts: u32) -> Option<Self> {
        match NonZeroU32::new(attempts) {
            Some(value) => Some(Self(value)),
            None => None,
        }
    }

    /// Returns the total attempt count (always >= 1).
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self(NonZeroU32::MIN.saturating_add(DEFAULT_RETRY_BUDGET - 1))
    }
}

impl fmt::Display for RetryBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.get().fmt(f)
    }
}

// ============================================================================
// SECTION: Rewind Strategy
// ============================================================================

/// How a transaction is rewound after a retryable failure.
///
/// # Invariants
/// - Variants are stable for configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewindStrategy {
    /// Roll back to a savepoint taken once after begin; the transaction stays
    /// open across attempts.
    #[default]
    Savepoint,
    /// Abort and re-begin the transaction on every retry, for backends where a
    /// savepoint rewind cannot clear the conflict.
    Restart,
}

impl RewindStrategy {
    /// Returns a stable label for the strategy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Savepoint => "savepoint",
            Self::Restart => "restart",
        }
    }
}

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Retry policy applied by a [`crate::TransactionCoordinator`].
///
/// # Invariants
/// - `savepoint_name` is a plain SQL identifier supplied by configuration,
///   never by untrusted input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Default attempt budget.
    budget: RetryBudget,
    /// Rewind strategy between attempts.
    rewind: RewindStrategy,
    /// Name of the rollback point.
    savepoint_name: String,
}

impl RetryPolicy {
    /// Creates a policy with the given budget and savepoint defaults.
    #[must_use]
    pub fn new(budget: RetryBudget) -> Self {
        Self {
            budget,
            rewind: RewindStrategy::Savepoint,
            savepoint_name: DEFAULT_SAVEPOINT.to_string(),
        }
    }

    /// Sets the rewind strategy.
    #[must_use]
    pub const fn with_rewind(mut self, rewind: RewindStrategy) -> Self {
        self.rewind = rewind;
        self
    }

    /// Sets the rollback point name.
    #[must_use]
    pub fn with_savepoint_name(mut self, name: impl Into<String>) -> Self {
        self.savepoint_name = name.into();
        self
    }

    /// Returns the default attempt budget.
    #[must_use]
    pub const fn budget(&self) -> RetryBudget {
        self.budget
    }

    /// Returns the rewind strategy.
    #[must_use]
    pub const fn rewind(&self) -> RewindStrategy {
        self.rewind
    }

    /// Returns the rollback point name.
    #[must_use]
    pub fn savepoint_name(&self) -> &str {
        &self.savepoint_name
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryBudget::default())
    }
}

/// Returns true when `name` is a plain SQL identifier safe to splice into
/// `SAVEPOINT` statements: ASCII letter or underscore first, then ASCII
/// alphanumerics or underscores, at most [`MAX_SAVEPOINT_NAME_LENGTH`] bytes.
#[must_use]
pub fn is_valid_savepoint_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    name.len() <= MAX_SAVEPOINT_NAME_LENGTH
        && (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}
