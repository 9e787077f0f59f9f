//! Divide and conquer on a work-stealing pool.
//!
//! Every range is halved recursively until it holds at most
//! [`MINIMUM_RANGE`] numbers; such a leaf is counted directly. The two halves
//! of every split are forked with [`rayon::join`] and their counts added when
//! both complete, so the shape of the work adapts to the size of each range
//! rather than to the partition plan.
//!
//! ```text
//!                 [1, 4000]
//!            ┌────────┴────────┐
//!        [1, 2000]        [2001, 4000]
//!        ┌───┴───┐         ┌───┴───┐
//!     [1,1000] [1001,2000] ...     ...     ◄── leaves counted directly
//! ```
//!
//! The pool is private to the instance: built in `setup` with one thread per
//! parallel unit and dropped in `teardown`.

use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::error::CountingError;
use crate::oracle::{count_primes_until_cancelled, CancelToken};
use crate::range::{PartitionPlan, Range};
use crate::strategies::Strategy;

/// Ranges at most this long are counted without splitting further.
pub const MINIMUM_RANGE: u64 = 1000;

/// Recursively halves ranges on a private work-stealing pool.
pub struct ForkJoin {
    parallelism: NonZeroUsize,
    pool: Option<ThreadPool>,
    ranges: Vec<Range>,
    cancel: CancelToken,
}

impl ForkJoin {
    pub fn new(parallelism: NonZeroUsize) -> Self {
        Self {
            parallelism,
            pool: None,
            ranges: Vec::new(),
            cancel: CancelToken::new(),
        }
    }
}

/// Forks over the list of ranges, then into each range.
fn fork_ranges(ranges: &[Range], cancel: &CancelToken) -> Result<u64, CountingError> {
    match ranges {
        [] => Ok(0),
        [range] => fork_range(*range, cancel),
        _ => {
            let (left, right) = ranges.split_at(ranges.len() / 2);
            let (left, right) = rayon::join(|| fork_ranges(left, cancel), || fork_ranges(right, cancel));
            Ok(left? + right?)
        }
    }
}

fn fork_range(range: Range, cancel: &CancelToken) -> Result<u64, CountingError> {
    match range.split() {
        Some((first, second)) if range.len() > MINIMUM_RANGE => {
            let (first, second) =
                rayon::join(|| fork_range(first, cancel), || fork_range(second, cancel));
            Ok(first? + second?)
        }
        _ => count_primes_until_cancelled(range, cancel),
    }
}

impl Strategy for ForkJoin {
    fn setup(&mut self, plan: &PartitionPlan) -> Result<(), CountingError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.parallelism.get())
            .thread_name(|i| format!("fork-join-{i}"))
            .build()
            .map_err(|e| CountingError::PoolBuild(e.to_string()))?;

        self.pool = Some(pool);
        self.ranges = plan.to_vec();
        Ok(())
    }

    fn execute(&mut self) -> Result<u64, CountingError> {
        let pool = self.pool.as_ref().ok_or(CountingError::NotSetUp)?;
        let (ranges, cancel) = (&self.ranges, &self.cancel);

        panic::catch_unwind(AssertUnwindSafe(|| pool.install(|| fork_ranges(ranges, cancel))))
            .map_err(|_| CountingError::WorkerPanicked {
                worker: "fork-join".to_string(),
            })?
    }

    fn teardown(&mut self) {
        self.cancel.cancel();
        if let Some(pool) = self.pool.take() {
            debug!(threads = pool.current_num_threads(), "fork-join pool released");
        }
    }
}
