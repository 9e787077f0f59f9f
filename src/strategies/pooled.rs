//! One task per range submitted to a worker pool that grows on demand.
//!
//! All tasks are submitted as one batch and the caller waits for the whole
//! batch before summing. `teardown` cancels whatever is still running and
//! shuts the pool down.

use tracing::debug;

use crate::error::CountingError;
use crate::oracle::{count_primes_until_cancelled, CancelToken};
use crate::range::{PartitionPlan, Range};
use crate::strategies::cached_pool::CachedPool;
use crate::strategies::Strategy;

/// Submits every range to a cached worker pool and waits for the batch.
pub struct Pooled {
    pool: CachedPool,
    ranges: Option<Vec<Range>>,
    cancel: CancelToken,
}

impl Pooled {
    pub fn new() -> Self {
        Self {
            pool: CachedPool::new("pooled"),
            ranges: None,
            cancel: CancelToken::new(),
        }
    }
}

impl Default for Pooled {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for Pooled {
    fn setup(&mut self, plan: &PartitionPlan) -> Result<(), CountingError> {
        self.ranges = Some(plan.to_vec());
        Ok(())
    }

    fn execute(&mut self) -> Result<u64, CountingError> {
        let ranges = self.ranges.take().ok_or(CountingError::NotSetUp)?;
        let tasks: Vec<_> = ranges
            .into_iter()
            .map(|range| {
                let cancel = self.cancel.clone();
                move || count_primes_until_cancelled(range, &cancel)
            })
            .collect();

        Ok(self.pool.invoke_all(tasks)?.into_iter().sum())
    }

    fn teardown(&mut self) {
        self.cancel.cancel();
        let discarded = self.pool.shutdown_now();
        debug!(discarded, "pooled torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::partition;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn test_pool_grows_with_the_batch() {
        let plan = partition(20_000, 6).unwrap();
        let mut strategy = Pooled::new();
        strategy.setup(&plan).unwrap();
        assert_eq!(strategy.pool.workers(), 0);

        assert_eq!(strategy.execute().unwrap(), 2262);
        assert!(strategy.pool.workers() >= 1);

        strategy.teardown();
        assert_eq!(strategy.pool.workers(), 0);
    }

    #[test]
    fn test_teardown_is_repeatable() {
        let mut strategy = Pooled::new();
        strategy.teardown();
        strategy.teardown();
    }

    #[test]
    fn test_teardown_cancels_tasks_still_counting() {
        let plan = partition(400_000_000, 4).unwrap();
        let mut strategy = Pooled::new();
        strategy.setup(&plan).unwrap();

        let cancel = strategy.cancel.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            cancel.cancel();
        });

        let started = Instant::now();
        assert!(matches!(strategy.execute(), Err(CountingError::Cancelled)));
        strategy.teardown();
        canceller.join().unwrap();
        assert_eq!(strategy.pool.workers(), 0);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
