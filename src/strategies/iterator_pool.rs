//! Pre-built element iterators drained on the on-demand worker pool.
//!
//! A variation of [`pooled`](super::pooled): `setup` turns every range into a
//! boxed iterator over its numbers, so that preparation stays out of the
//! timed section. `execute` hands one iterator to each pool task, which
//! drains it into a local count.

use tracing::debug;

use crate::error::CountingError;
use crate::oracle::{is_prime, CancelToken};
use crate::range::PartitionPlan;
use crate::strategies::cached_pool::CachedPool;
use crate::strategies::Strategy;

type Numbers = Box<dyn Iterator<Item = u64> + Send>;

const CANCEL_CHECK_INTERVAL: usize = 1024;

/// Drains one prepared iterator per range on a cached worker pool.
pub struct IteratorPool {
    pool: CachedPool,
    iterators: Option<Vec<Numbers>>,
    cancel: CancelToken,
}

impl IteratorPool {
    pub fn new() -> Self {
        Self {
            pool: CachedPool::new("iterator-pool"),
            iterators: None,
            cancel: CancelToken::new(),
        }
    }
}

impl Default for IteratorPool {
    fn default() -> Self {
        Self::new()
    }
}

fn drain(numbers: Numbers, cancel: &CancelToken) -> Result<u64, CountingError> {
    let mut count = 0;
    for (seen, n) in numbers.enumerate() {
        if seen % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
            return Err(CountingError::Cancelled);
        }
        count += u64::from(is_prime(n));
    }
    Ok(count)
}

impl Strategy for IteratorPool {
    fn setup(&mut self, plan: &PartitionPlan) -> Result<(), CountingError> {
        self.iterators = Some(
            plan.iter()
                .map(|range| Box::new(range.iter()) as Numbers)
                .collect(),
        );
        Ok(())
    }

    fn execute(&mut self) -> Result<u64, CountingError> {
        let iterators = self.iterators.take().ok_or(CountingError::NotSetUp)?;
        let tasks: Vec<_> = iterators
            .into_iter()
            .map(|numbers| {
                let cancel = self.cancel.clone();
                move || drain(numbers, &cancel)
            })
            .collect();

        Ok(self.pool.invoke_all(tasks)?.into_iter().sum())
    }

    fn teardown(&mut self) {
        self.cancel.cancel();
        self.iterators = None;
        let discarded = self.pool.shutdown_now();
        debug!(discarded, "iterator pool torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::{partition, Range};
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn test_setup_prepares_one_iterator_per_range() {
        let plan = partition(1_000, 5).unwrap();
        let mut strategy = IteratorPool::new();
        strategy.setup(&plan).unwrap();
        assert_eq!(strategy.iterators.as_ref().map(Vec::len), Some(5));
        assert_eq!(strategy.execute().unwrap(), 168);
        strategy.teardown();
    }

    #[test]
    fn test_drain_observes_cancellation() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let numbers: Numbers = Box::new(Range::new(1, 10).iter());
        assert!(matches!(drain(numbers, &cancel), Err(CountingError::Cancelled)));
    }

    #[test]
    fn test_teardown_cancels_iterators_still_draining() {
        let plan = partition(400_000_000, 4).unwrap();
        let mut strategy = IteratorPool::new();
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
