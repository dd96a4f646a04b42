//! Concurrent batch execution with a hard concurrency ceiling.
//!
//! [`run`] fans a list of independent work items out across a bounded pool of
//! in-flight futures. One item's failure never aborts its siblings; every
//! submitted item reaches a terminal outcome and is reported in exactly one
//! of the two result lists. Retry policy is deliberately left to the caller,
//! which can classify each failure via [`Error::is_transient`].

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{error, info, warn};

use crate::error::{Error, Result};

/// Shared cancellation flag for a batch.
///
/// Once raised, items that have not yet started are reported as
/// [`Error::Cancelled`] failures instead of being dispatched; items already
/// in flight finish naturally and keep their real outcomes.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal(Arc<AtomicBool>);

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One item that could not be completed, keyed by its input identifier.
#[derive(Debug)]
pub struct BatchFailure<K> {
    pub id: K,
    pub error: Error,
}

/// Complete accounting of a batch: partial success, never all-or-nothing.
///
/// Successes are in submission order; failures are in completion order.
/// Every input identifier appears in exactly one of the two lists.
#[derive(Debug)]
pub struct BatchOutcome<K, T> {
    pub successes: Vec<(K, T)>,
    pub failures: Vec<BatchFailure<K>>,
}

impl<K, T> BatchOutcome<K, T> {
    pub fn len(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when no item failed. Callers must check this (or inspect
    /// `failures`) to detect degraded results.
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Run `perform` over every item with at most `limit` in flight at once.
///
/// Completion order may differ from submission order; the association
/// between each identifier and its outcome is preserved.
pub async fn run<K, T, F, Fut>(
    items: Vec<K>,
    limit: usize,
    cancel: Option<CancelSignal>,
    perform: F,
) -> BatchOutcome<K, T>
where
    K: Clone,
    F: Fn(K) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let total = items.len();
    info!(total, limit, "Dispatching batch");

    let perform = &perform;
    let cancel = &cancel;
    let outcomes: Vec<(usize, K, Result<T>)> = stream::iter(items.into_iter().enumerate())
        .map(|(index, id)| async move {
            if cancel.as_ref().is_some_and(CancelSignal::is_cancelled) {
                return (index, id, Err(Error::Cancelled));
            }
            let result = perform(id.clone()).await;
            (index, id, result)
        })
        .buffer_unordered(limit.max(1))
        .collect()
        .await;

    let mut successes = Vec::with_capacity(total);
    let mut failures = Vec::new();
    for (index, id, result) in outcomes {
        match result {
            Ok(value) => successes.push((index, id, value)),
            Err(error) => failures.push(BatchFailure { id, error }),
        }
    }
    successes.sort_by_key(|(index, _, _)| *index);
    let successes: Vec<(K, T)> = successes.into_iter().map(|(_, id, value)| (id, value)).collect();

    let succeeded = successes.len();
    if succeeded == 0 && total > 0 {
        error!(succeeded, total, "Batch failed entirely");
    } else if succeeded < total {
        warn!(succeeded, total, "Batch partially succeeded");
    } else {
        info!(succeeded, total, "Batch succeeded");
    }

    BatchOutcome { successes, failures }
}
