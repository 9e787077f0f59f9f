//! One OS thread per range, joined one after another.
//!
//! `setup` only prepares the workers; the threads are spawned when `execute`
//! starts, each counts its range into its own result, and the caller joins
//! them in range order and sums what they return.

use std::thread::{self, JoinHandle};

use tracing::debug;

use crate::error::CountingError;
use crate::oracle::{count_primes_until_cancelled, CancelToken};
use crate::range::{PartitionPlan, Range};
use crate::strategies::Strategy;

type Worker = JoinHandle<Result<u64, CountingError>>;

/// Spawns a thread per range and joins each in turn.
#[derive(Debug, Default)]
pub struct ThreadPerRange {
    ranges: Option<Vec<Range>>,
    handles: Vec<(usize, Worker)>,
    cancel: CancelToken,
}

impl ThreadPerRange {
    pub fn new() -> Self {
        Self::default()
    }

    fn spawn_all(&mut self, ranges: &[Range]) -> Result<(), CountingError> {
        for (index, &range) in ranges.iter().enumerate() {
            let cancel = self.cancel.clone();
            let handle = thread::Builder::new()
                .name(format!("range-{index}"))
                .spawn(move || count_primes_until_cancelled(range, &cancel))
                .map_err(CountingError::Spawn)?;
            self.handles.push((index, handle));
        }
        Ok(())
    }
}

impl Strategy for ThreadPerRange {
    fn setup(&mut self, plan: &PartitionPlan) -> Result<(), CountingError> {
        self.ranges = Some(plan.to_vec());
        Ok(())
    }

    fn execute(&mut self) -> Result<u64, CountingError> {
        let ranges = self.ranges.take().ok_or(CountingError::NotSetUp)?;
        self.spawn_all(&ranges)?;

        let mut total = 0;
        let mut handles = std::mem::take(&mut self.handles).into_iter();
        while let Some((index, handle)) = handles.next() {
            let joined = handle.join().map_err(|_| CountingError::WorkerPanicked {
                worker: format!("range-{index}"),
            });
            match joined.and_then(|count| count) {
                Ok(count) => total += count,
                Err(err) => {
                    // Whatever has not been joined yet is left for teardown.
                    self.handles = handles.collect();
                    return Err(err);
                }
            }
        }
        Ok(total)
    }

    fn teardown(&mut self) {
        self.cancel.cancel();
        let outstanding = self.handles.len();
        for (_, handle) in self.handles.drain(..) {
            let _ = handle.join();
        }
        debug!(outstanding, "thread-per-range torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::partition;
    use std::time::{Duration, Instant};

    #[test]
    fn test_joins_every_thread() {
        let plan = partition(5_000, 6).unwrap();
        let mut strategy = ThreadPerRange::new();
        strategy.setup(&plan).unwrap();
        assert_eq!(strategy.execute().unwrap(), 669);
        assert!(strategy.handles.is_empty());
        strategy.teardown();
    }

    #[test]
    fn test_cancelled_workers_fail_the_count() {
        let plan = partition(5_000, 3).unwrap();
        let mut strategy = ThreadPerRange::new();
        strategy.setup(&plan).unwrap();
        strategy.cancel.cancel();
        assert!(matches!(strategy.execute(), Err(CountingError::Cancelled)));
        strategy.teardown();
        assert!(strategy.handles.is_empty());
    }

    #[test]
    fn test_teardown_stops_workers_left_by_a_failure() {
        let mut strategy = ThreadPerRange::new();
        strategy.ranges = Some(Vec::new());
        strategy.handles.push((
            0,
            thread::spawn(|| Err(CountingError::TaskFailed("injected".to_string()))),
        ));
        for index in 1..4 {
            let cancel = strategy.cancel.clone();
            let range = Range::new(1, 500_000_000);
            strategy
                .handles
                .push((index, thread::spawn(move || count_primes_until_cancelled(range, &cancel))));
        }

        let started = Instant::now();
        assert!(matches!(strategy.execute(), Err(CountingError::TaskFailed(_))));
        assert_eq!(strategy.handles.len(), 3);

        strategy.teardown();
        assert!(strategy.handles.is_empty());
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
