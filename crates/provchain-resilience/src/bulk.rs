use std::future::Future;

use crate::failure::Failure;

/// Aggregate result of a bulk operation with per-item isolation.
///
/// One item's failure never aborts the rest; each outcome is recorded in
/// order alongside the aggregate counts.
#[derive(Debug)]
pub struct BulkReport<T> {
    /// Number of items that completed successfully.
    pub successful: usize,
    /// Number of items that failed.
    pub failed: usize,
    /// Per-item outcomes, in input order.
    pub outcomes: Vec<Result<T, Failure>>,
}

impl<T> BulkReport<T> {
    /// Build a report from collected per-item outcomes.
    pub fn from_outcomes(outcomes: Vec<Result<T, Failure>>) -> Self {
        let successful = outcomes.iter().filter(|o| o.is_ok()).count();
        let failed = outcomes.len() - successful;
        Self {
            successful,
            failed,
            outcomes,
        }
    }

    /// Total number of items.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Returns `true` if the report covers no items.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Returns `true` if every item succeeded.
    pub fn is_all_ok(&self) -> bool {
        self.failed == 0
    }

    /// The first recorded failure, if any.
    pub fn first_failure(&self) -> Option<&Failure> {
        self.outcomes.iter().find_map(|o| o.as_ref().err())
    }

    /// Iterate over the successful values.
    pub fn successes(&self) -> impl Iterator<Item = &T> {
        self.outcomes.iter().filter_map(|o| o.as_ref().ok())
    }
}

/// Run a set of independent operations, isolating per-item failures.
///
/// Every operation runs to completion regardless of the others' outcomes;
/// failures are classified and recorded, never re-raised out of the batch.
pub async fn run_isolated<T, F, Fut>(ops: Vec<F>) -> BulkReport<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, Failure>>,
{
    let mut outcomes = Vec::with_capacity(ops.len());
    for op in ops {
        outcomes.push(op().await);
    }
    BulkReport::from_outcomes(outcomes)
}
