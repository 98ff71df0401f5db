// crates/serial-retry-core/src/runtime/coordinator.rs
// ============================================================================
// Module: Transaction Retry Coordinator
// Description: Begin, rollback point, bounded re-execution, commit.
// Purpose: Run a work unit exactly once to commit despite serialization conflicts.
// Dependencies: crate::{core, interfaces, runtime}, thiserror, tracing
// ============================================================================

//! ## Overview
//! [`TransactionCoordinator::run`] drives one logical operation through
//! `Idle -> TxnOpen -> Executing -> {Committed | RolledBack -> Executing |
//! Exhausted | Fatal}`:
//! - the transaction is opened and the rollback point taken exactly once;
//! - a retryable failure rewinds to the rollback point and re-executes;
//! - the work unit runs at most `budget` times;
//! - every terminal failure aborts the transaction before returning.
//!
//! Control operations (begin, savepoint, rewind, commit) are never retried.
//! Callers observe a commit, [`RetryError::Exhausted`] wrapping the last
//! conflict, the original error as [`RetryError::Fatal`], a
//! [`RetryError::Control`] failure, or [`RetryError::Cancelled`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::error::Error;
use std::fmt;

use thiserror::Error;

use crate::core::classifier::ErrorClassifier;
use crate::core::status::BoxError;
use crate::interfaces::Session;
use crate::runtime::cancel::CancelFlag;
use crate::runtime::policy::RetryBudget;
use crate::runtime::policy::RetryPolicy;
use crate::runtime::policy::RewindStrategy;

// ============================================================================
// SECTION: Outcomes
// ============================================================================

/// Transaction-control step that failed.
///
/// # Invariants
/// - Variants are stable for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlPhase {
    /// Opening the transaction.
    Begin,
    /// Establishing the rollback point.
    Savepoint,
    /// Rewinding between attempts.
    Rewind,
    /// Committing the transaction.
    Commit,
}

impl ControlPhase {
    /// Returns a stable label for the phase.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Begin => "begin",
            Self::Savepoint => "savepoint",
            Self::Rewind => "rewind",
            Self::Commit => "commit",
        }
    }
}

impl fmt::Display for ControlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Successful terminal outcome of one logical operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed<T> {
    /// Value returned by the committing attempt.
    pub value: T,
    /// Retries consumed before the commit (0 = first attempt committed).
    pub retries: u32,
}

impl<T> Committed<T> {
    /// Returns the number of work-unit invocations.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

/// Failed terminal outcome of one logical operation.
///
/// # Invariants
/// - `Fatal` carries the work unit's error unchanged.
/// - `Exhausted` carries the conflict raised by the final attempt.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The budget was consumed without a commit.
    #[error("transaction retries exhausted after {attempts} attempts")]
    Exhausted {
        /// Work-unit invocations performed.
        attempts: u32,
        /// Conflict raised by the final attempt.
        #[source]
        source: E,
    },
    /// The work unit failed with a non-retryable error.
    #[error(transparent)]
    Fatal(E),
    /// A transaction-control operation failed.
    #[error("transaction {phase} failed: {source}")]
    Control {
        /// Failed control step.
        phase: ControlPhase,
        /// Backend error.
        #[source]
        source: BoxError,
    },
    /// Cancellation was requested before a terminal outcome.
    #[error("transaction cancelled after {attempts} attempts")]
    Cancelled {
        /// Work-unit invocations performed before cancellation.
        attempts: u32,
    },
}

impl<E> RetryError<E> {
    /// Returns the work unit's original error for fatal outcomes.
    #[must_use]
    pub const fn fatal(&self) -> Option<&E> {
        match self {
            Self::Fatal(error) => Some(error),
            _ => None,
        }
    }

    /// Consumes the error, returning the original fatal error if any.
    #[must_use]
    pub fn into_fatal(self) -> Option<E> {
        match self {
            Self::Fatal(error) => Some(error),
            _ => None,
        }
    }

    /// Returns true when the budget ran out.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }

    /// Returns true when the operation was cancelled.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Result of a single attempt, consumed immediately by the loop.
enum AttemptOutcome<T, E> {
    /// Work unit returned a value.
    Committed(T),
    /// Work unit raised a conflict the classifier accepts.
    RetryableFailure {
        /// Conflict error.
        error: E,
        /// Matched status code.
        code: String,
    },
    /// Work unit raised any other error.
    FatalFailure(E),
}

// ============================================================================
// SECTION: Coordinator
// ============================================================================

/// Runs work units transactionally with bounded, savepoint-based retries.
///
/// # Invariants
/// - Holds no per-operation state; one coordinator may serve many threads,
///   each with its own session.
#[derive(Debug, Clone)]
pub struct TransactionCoordinator {
    /// Retry policy.
    policy: RetryPolicy,
    /// Conflict classifier.
    classifier: ErrorClassifier,
    /// Optional cancellation signal.
    cancel: Option<CancelFlag>,
}

impl TransactionCoordinator {
    /// Creates a coordinator.
    #[must_use]
    pub const fn new(policy: RetryPolicy, classifier: ErrorClassifier) -> Self {
        Self {
            policy,
            classifier,
            cancel: None,
        }
    }

    /// Attaches a cancellation flag checked between attempts.
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Returns the retry policy.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Returns the classifier.
    #[must_use]
    pub const fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    /// Runs `work` under the policy's default budget.
    ///
    /// # Errors
    ///
    /// Returns [`RetryError`] when the operation does not commit.
    pub fn run<S, T, E, F>(&self, session: &mut S, work: F) -> Result<Committed<T>, RetryError<E>>
    where
        S: Session,
        E: Error + 'static,
        F: FnMut(&mut S) -> Result<T, E>,
    {
        self.run_with_budget(session, self.policy.budget(), work)
    }

    /// Runs `work` with a per-operation budget override.
    ///
    /// # Errors
    ///
    /// Returns [`RetryError`] when the operation does not commit.
    pub fn run_with_budget<S, T, E, F>(
        &self,
        session: &mut S,
        budget: RetryBudget,
        mut work: F,
    ) -> Result<Committed<T>, RetryError<E>>
    where
        S: Session,
        E: Error + 'static,
        F: FnMut(&mut S) -> Result<T, E>,
    {
        if self.is_cancelled() {
            return Err(RetryError::Cancelled {
                attempts: 0,
            });
        }
        self.open::<S, E>(session)?;

        let mut attempts: u32 = 0;
        loop {
            if self.is_cancelled() {
                return Err(self.cancelled(session, attempts));
            }
            let outcome = self.attempt(session, &mut work);
            attempts = attempts.saturating_add(1);
            match outcome {
                AttemptOutcome::Committed(value) => {
                    if self.is_cancelled() {
                        return Err(self.cancelled(session, attempts));
                    }
                    if let Err(err) = session.commit() {
                        release(session);
                        return Err(control(ControlPhase::Commit, err));
                    }
                    let retries = attempts - 1;
                    tracing::debug!(retries, "transaction committed");
                    return Ok(Committed {
                        value,
                        retries,
                    });
                }
                AttemptOutcome::FatalFailure(error) => {
                    if self.is_cancelled() {
                        return Err(self.cancelled(session, attempts));
                    }
                    tracing::debug!(attempt = attempts, "non-retryable failure; aborting transaction");
                    release(session);
                    return Err(RetryError::Fatal(error));
                }
                AttemptOutcome::RetryableFailure {
                    error,
                    code,
                } => {
                    if self.is_cancelled() {
                        return Err(self.cancelled(session, attempts));
                    }
                    if attempts >= budget.get() {
                        tracing::warn!(
                            attempts,
                            budget = budget.get(),
                            code = code.as_str(),
                            "transaction retries exhausted"
                        );
                        release(session);
                        return Err(RetryError::Exhausted {
                            attempts,
                            source: error,
                        });
                    }
                    tracing::debug!(
                        attempt = attempts,
                        budget = budget.get(),
                        code = code.as_str(),
                        "retryable conflict; rewinding"
                    );
                    self.rewind::<S, E>(session)?;
                }
            }
        }
    }

    /// Runs the work unit once and classifies the result.
    fn attempt<S, T, E, F>(&self, session: &mut S, work: &mut F) -> AttemptOutcome<T, E>
    where
        S: Session,
        E: Error + 'static,
        F: FnMut(&mut S) -> Result<T, E>,
    {
        match work(session) {
            Ok(value) => AttemptOutcome::Committed(value),
            Err(error) => match self.classifier.retryable_code(&error) {
                Some(code) => AttemptOutcome::RetryableFailure {
                    error,
                    code,
                },
                None => AttemptOutcome::FatalFailure(error),
            },
        }
    }

    /// Begins the transaction and takes the rollback point.
    fn open<S, E>(&self, session: &mut S) -> Result<(), RetryError<E>>
    where
        S: Session,
    {
        session.begin().map_err(|err| control(ControlPhase::Begin, err))?;
        if self.policy.rewind() == RewindStrategy::Savepoint
            && let Err(err) = session.savepoint(self.policy.savepoint_name())
        {
            release(session);
            return Err(control(ControlPhase::Savepoint, err));
        }
        Ok(())
    }

    /// Rewinds the transaction to the state right after begin.
    fn rewind<S, E>(&self, session: &mut S) -> Result<(), RetryError<E>>
    where
        S: Session,
    {
        let result = match self.policy.rewind() {
            RewindStrategy::Savepoint => {
                session.rollback_to_savepoint(self.policy.savepoint_name())
            }
            RewindStrategy::Restart => session.rollback().and_then(|()| session.begin()),
        };
        result.map_err(|err| {
            release(session);
            control(ControlPhase::Rewind, err)
        })
    }

    /// Aborts the transaction and reports cancellation.
    fn cancelled<S, E>(&self, session: &mut S, attempts: u32) -> RetryError<E>
    where
        S: Session,
    {
        tracing::debug!(attempts, "transaction cancelled; aborting");
        release(session);
        RetryError::Cancelled {
            attempts,
        }
    }

    /// Returns true when the attached flag is set.
    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Aborts the open transaction; failures are logged, not surfaced, so they
/// never mask the primary outcome.
fn release<S: Session>(session: &mut S) {
    if let Err(err) = session.rollback() {
        tracing::warn!(error = %err, "transaction rollback after terminal outcome failed");
    }
}

/// Wraps a control-operation failure.
fn control<E, C>(phase: ControlPhase, err: C) -> RetryError<E>
where
    C: Error + Send + Sync + 'static,
{
    RetryError::Control {
        phase,
        source: Box::new(err),
    }
}
