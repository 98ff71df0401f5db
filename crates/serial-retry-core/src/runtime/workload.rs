// crates/serial-retry-core/src/runtime/workload.rs
// ============================================================================
// Module: Concurrent Workload Driver
// Description: Fixed-size worker pool feeding items through the coordinator.
// Purpose: Manufacture contention on shared keys and record every outcome.
// Dependencies: crate::{interfaces, runtime}, serde, thiserror, tracing
// ============================================================================

//! ## Overview
//! [`WorkloadDriver::run`] starts `workers` named threads. Each thread pulls
//! the next item index from a shared counter, acquires its own session, and
//! runs exactly one coordinator invocation for that item. Threads share only
//! the provider, the coordinator, and the counter; every other piece of state
//! is per item. The driver joins every thread before returning a
//! [`WorkloadReport`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::error::Error;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::interfaces::SessionProvider;
use crate::runtime::cancel::CancelFlag;
use crate::runtime::coordinator::RetryError;
use crate::runtime::coordinator::TransactionCoordinator;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Worker pool configuration.
///
/// # Invariants
/// - `workers` and `items` are greater than zero once validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadConfig {
    /// Number of worker threads.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Number of work items to submit.
    #[serde(default = "default_items")]
    pub items: usize,
    /// Thread name prefix; threads are named `{prefix}-{index:02}`.
    #[serde(default = "default_thread_prefix")]
    pub thread_prefix: String,
}

/// Returns the default worker count.
const fn default_workers() -> usize {
    20
}

/// Returns the default item count.
const fn default_items() -> usize {
    1_000
}

/// Returns the default thread name prefix.
fn default_thread_prefix() -> String {
    "worker".to_string()
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            items: default_items(),
            thread_prefix: default_thread_prefix(),
        }
    }
}

impl WorkloadConfig {
    /// Validates pool sizing.
    ///
    /// # Errors
    ///
    /// Returns [`WorkloadError::Invalid`] when a count is zero.
    pub fn validate(&self) -> Result<(), WorkloadError> {
        if self.workers == 0 {
            return Err(WorkloadError::Invalid("workers must be greater than zero".to_string()));
        }
        if self.items == 0 {
            return Err(WorkloadError::Invalid("items must be greater than zero".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Workload driver errors.
///
/// # Invariants
/// - Per-item failures are reported in [`WorkloadReport`], not here.
#[derive(Debug, Error)]
pub enum WorkloadError {
    /// Invalid pool configuration.
    #[error("workload invalid: {0}")]
    Invalid(String),
    /// A worker thread could not be started.
    #[error("workload worker spawn failed: {0}")]
    Spawn(String),
    /// A worker thread panicked.
    #[error("workload worker panicked: {0}")]
    WorkerPanicked(String),
}

// ============================================================================
// SECTION: Report
// ============================================================================

/// Terminal status of one work item.
///
/// # Invariants
/// - Variants are stable for report serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Committed.
    Committed,
    /// Retry budget exhausted.
    Exhausted,
    /// Non-retryable work-unit failure.
    Fatal,
    /// Transaction-control failure.
    Control,
    /// Cancelled before a terminal outcome.
    Cancelled,
    /// No session could be acquired.
    AcquireFailed,
}

/// Recorded outcome of one work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOutcome {
    /// Item index.
    pub item: usize,
    /// Name of the worker thread that ran the item.
    pub worker: String,
    /// Terminal status.
    pub status: ItemStatus,
    /// Work-unit invocations, when known.
    pub attempts: Option<u32>,
    /// Wall-clock time for the item in milliseconds.
    pub elapsed_ms: u64,
    /// Error message for failed items.
    pub error: Option<String>,
}

/// Aggregate result of a workload run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadReport {
    /// Items committed.
    pub committed: usize,
    /// Items that exhausted their budget.
    pub exhausted: usize,
    /// Items that failed with a non-retryable error.
    pub fatal: usize,
    /// Items whose transaction-control operations failed.
    pub control: usize,
    /// Items cancelled before a terminal outcome.
    pub cancelled: usize,
    /// Items that could not acquire a session.
    pub acquire_failed: usize,
    /// Retries consumed across all committed and exhausted items.
    pub total_retries: u64,
    /// Largest retry count observed for a single item.
    pub max_retries: u32,
    /// Wall-clock time for the whole run in milliseconds.
    pub elapsed_ms: u64,
    /// Per-item outcomes ordered by item index.
    pub items: Vec<ItemOutcome>,
}

impl WorkloadReport {
    /// Returns the number of items that reached any terminal outcome.
    #[must_use]
    pub const fn terminal_count(&self) -> usize {
        self.committed
            + self.exhausted
            + self.fatal
            + self.control
            + self.cancelled
            + self.acquire_failed
    }

    /// Returns true when every recorded item committed.
    #[must_use]
    pub const fn all_committed(&self) -> bool {
        self.committed == self.items.len()
    }

    /// Folds per-item outcomes into the aggregate counters.
    fn from_items(mut items: Vec<ItemOutcome>, elapsed: Duration) -> Self {
        items.sort_by_key(|outcome| outcome.item);
        let mut report = Self {
            elapsed_ms: duration_ms(elapsed),
            ..Self::default()
        };
        for outcome in &items {
            match outcome.status {
                ItemStatus::Committed => report.committed += 1,
                ItemStatus::Exhausted => report.exhausted += 1,
                ItemStatus::Fatal => report.fatal += 1,
                ItemStatus::Control => report.control += 1,
                ItemStatus::Cancelled => report.cancelled += 1,
                ItemStatus::AcquireFailed => report.acquire_failed += 1,
            }
            if let Some(attempts) = outcome.attempts
                && matches!(outcome.status, ItemStatus::Committed | ItemStatus::Exhausted)
            {
                let retries = attempts.saturating_sub(1);
                report.total_retries = report.total_retries.saturating_add(u64::from(retries));
                report.max_retries = report.max_retries.max(retries);
            }
        }
        report.items = items;
        report
    }
}

// ============================================================================
// SECTION: Driver
// ============================================================================

/// Fixed-size worker pool for contention workloads.
#[derive(Debug, Clone)]
pub struct WorkloadDriver {
    /// Pool configuration.
    config: WorkloadConfig,
    /// Optional signal that stops workers from pulling new items.
    cancel: Option<CancelFlag>,
}

impl WorkloadDriver {
    /// Creates a driver after validating the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`WorkloadError::Invalid`] when the configuration is invalid.
    pub fn new(config: WorkloadConfig) -> Result<Self, WorkloadError> {
        config.validate()?;
        Ok(Self {
            config,
            cancel: None,
        })
    }

    /// Stops workers from pulling new items once `flag` is set.
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Returns the pool configuration.
    #[must_use]
    pub const fn config(&self) -> &WorkloadConfig {
        &self.config
    }

    /// Runs every item through `coordinator` on the worker pool.
    ///
    /// `work` receives the item index and the item's session; it may be
    /// invoked several times per item.
    ///
    /// # Errors
    ///
    /// Returns [`WorkloadError`] when a worker cannot be spawned or panics.
    pub fn run<P, T, E, F>(
        &self,
        provider: &P,
        coordinator: &TransactionCoordinator,
        work: F,
    ) -> Result<WorkloadReport, WorkloadError>
    where
        P: SessionProvider,
        E: Error + 'static,
        F: Fn(usize, &mut P::Session) -> Result<T, E> + Sync,
    {
        let started = Instant::now();
        let next_item = AtomicUsize::new(0);
        let work = &work;
        let next_item = &next_item;
        let items = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(self.config.workers);
            for index in 0 .. self.config.workers {
                let name = format!("{}-{index:02}", self.config.thread_prefix);
                let worker_name = name.clone();
                let handle = thread::Builder::new()
                    .name(name)
                    .spawn_scoped(scope, move || {
                        self.worker_loop(&worker_name, next_item, provider, coordinator, work)
                    })
                    .map_err(|err| WorkloadError::Spawn(err.to_string()))?;
                handles.push(handle);
            }
            let mut items = Vec::with_capacity(self.config.items);
            for handle in handles {
                let outcomes = handle
                    .join()
                    .map_err(|_| WorkloadError::WorkerPanicked("worker thread panicked".to_string()))?;
                items.extend(outcomes);
            }
            Ok::<_, WorkloadError>(items)
        })?;
        let report = WorkloadReport::from_items(items, started.elapsed());
        tracing::info!(
            committed = report.committed,
            exhausted = report.exhausted,
            fatal = report.fatal,
            total_retries = report.total_retries,
            elapsed_ms = report.elapsed_ms,
            "workload finished"
        );
        Ok(report)
    }

    /// Pulls items until the counter passes the item count.
    fn worker_loop<P, T, E, F>(
        &self,
        worker: &str,
        next_item: &AtomicUsize,
        provider: &P,
        coordinator: &TransactionCoordinator,
        work: &F,
    ) -> Vec<ItemOutcome>
    where
        P: SessionProvider,
        E: Error + 'static,
        F: Fn(usize, &mut P::Session) -> Result<T, E> + Sync,
    {
        let mut outcomes = Vec::new();
        loop {
            if self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled) {
                break;
            }
            let item = next_item.fetch_add(1, Ordering::Relaxed);
            if item >= self.config.items {
                break;
            }
            outcomes.push(run_item(worker, item, provider, coordinator, work));
        }
        outcomes
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Runs a single item on a freshly acquired session.
fn run_item<P, T, E, F>(
    worker: &str,
    item: usize,
    provider: &P,
    coordinator: &TransactionCoordinator,
    work: &F,
) -> ItemOutcome
where
    P: SessionProvider,
    E: Error + 'static,
    F: Fn(usize, &mut P::Session) -> Result<T, E>,
{
    let started = Instant::now();
    let mut session = match provider.acquire() {
        Ok(session) => session,
        Err(err) => {
            tracing::warn!(item, worker, error = %err, "session acquire failed");
            return ItemOutcome {
                item,
                worker: worker.to_string(),
                status: ItemStatus::AcquireFailed,
                attempts: None,
                elapsed_ms: duration_ms(started.elapsed()),
                error: Some(err.to_string()),
            };
        }
    };
    let result = coordinator.run(&mut session, |session| work(item, session));
    let elapsed_ms = duration_ms(started.elapsed());
    let (status, attempts, error) = match result {
        Ok(committed) => {
            tracing::info!(item, worker, retries = committed.retries, elapsed_ms, "item committed");
            (ItemStatus::Committed, Some(committed.attempts()), None)
        }
        Err(err) => {
            tracing::warn!(item, worker, elapsed_ms, error = %err, "item failed");
            let (status, attempts) = match &err {
                RetryError::Exhausted {
                    attempts, ..
                } => (ItemStatus::Exhausted, Some(*attempts)),
                RetryError::Fatal(_) => (ItemStatus::Fatal, None),
                RetryError::Control {
                    ..
                } => (ItemStatus::Control, None),
                RetryError::Cancelled {
                    attempts,
                } => (ItemStatus::Cancelled, Some(*attempts)),
            };
            (status, attempts, Some(err.to_string()))
        }
    };
    ItemOutcome {
        item,
        worker: worker.to_string(),
        status,
        attempts,
        elapsed_ms,
        error,
    }
}

/// Converts a duration to whole milliseconds, saturating.
fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
