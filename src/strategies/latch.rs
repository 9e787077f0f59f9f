//! One OS thread per range, released through a single countdown latch.
//!
//! Functionally the same as [`thread_per_range`](super::thread_per_range), but
//! the caller waits once on a [`WaitGroup`] instead of joining every thread.
//! Each worker writes its count into its own cache-padded slot before it
//! counts the latch down, so the slots can be summed as soon as the wait
//! returns.
//!
//! ```text
//!   worker 0 ──count──► [slot 0] ──┐
//!   worker 1 ──count──► [slot 1] ──┼──► latch ──► caller sums slots
//!   worker n ──count──► [slot n] ──┘
//! ```
//!
//! A worker that panics or is cancelled still releases the latch (its
//! `WaitGroup` clone is dropped during unwinding), but it never marks itself
//! completed, which the caller detects after the wait.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_utils::sync::WaitGroup;
use crossbeam_utils::CachePadded;
use tracing::debug;

use crate::error::CountingError;
use crate::oracle::{count_primes_until_cancelled, CancelToken};
use crate::range::{PartitionPlan, Range};
use crate::strategies::Strategy;

/// State prepared by `setup` and consumed by `execute`.
struct Prepared {
    ranges: Vec<Range>,
    latch: WaitGroup,
}

/// Spawns a thread per range and awaits a countdown latch once.
pub struct Latch {
    prepared: Option<Prepared>,
    slots: Arc<[CachePadded<AtomicU64>]>,
    completed: Arc<AtomicUsize>,
    handles: Vec<JoinHandle<()>>,
    cancel: CancelToken,
}

impl Latch {
    pub fn new() -> Self {
        Self {
            prepared: None,
            slots: Arc::from(Vec::new()),
            completed: Arc::new(AtomicUsize::new(0)),
            handles: Vec::new(),
            cancel: CancelToken::new(),
        }
    }

    fn spawn_worker(&mut self, index: usize, range: Range, latch: WaitGroup) -> Result<(), CountingError> {
        let slots = Arc::clone(&self.slots);
        let completed = Arc::clone(&self.completed);
        let cancel = self.cancel.clone();

        let handle = thread::Builder::new()
            .name(format!("latch-{index}"))
            .spawn(move || {
                if let Ok(count) = count_primes_until_cancelled(range, &cancel) {
                    slots[index].store(count, Ordering::Relaxed);
                    completed.fetch_add(1, Ordering::Release);
                }
                drop(latch);
            })
            .map_err(CountingError::Spawn)?;

        self.handles.push(handle);
        Ok(())
    }
}

impl Strategy for Latch {
    fn setup(&mut self, plan: &PartitionPlan) -> Result<(), CountingError> {
        self.slots = (0..plan.len())
            .map(|_| CachePadded::new(AtomicU64::new(0)))
            .collect();
        self.completed = Arc::new(AtomicUsize::new(0));
        self.prepared = Some(Prepared {
            ranges: plan.to_vec(),
            latch: WaitGroup::new(),
        });
        Ok(())
    }

    fn execute(&mut self) -> Result<u64, CountingError> {
        let Prepared { ranges, latch } = self.prepared.take().ok_or(CountingError::NotSetUp)?;

        for (index, &range) in ranges.iter().enumerate() {
            self.spawn_worker(index, range, latch.clone())?;
        }
        latch.wait();

        let completed = self.completed.load(Ordering::Acquire);
        if completed != ranges.len() {
            if self.cancel.is_cancelled() {
                return Err(CountingError::Cancelled);
            }
            return Err(CountingError::Incomplete {
                expected: ranges.len(),
                completed,
            });
        }

        Ok(self.slots.iter().map(|slot| slot.load(Ordering::Relaxed)).sum())
    }

    fn teardown(&mut self) {
        self.cancel.cancel();
        self.prepared = None;
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
        debug!("latch torn down");
    }
}

impl Default for Latch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::partition;
    use std::time::{Duration, Instant};

    #[test]
    fn test_sums_every_slot() {
        let plan = partition(10_000, 8).unwrap();
        let mut strategy = Latch::new();
        strategy.setup(&plan).unwrap();
        assert_eq!(strategy.slots.len(), 8);
        assert_eq!(strategy.execute().unwrap(), 1229);
        strategy.teardown();
        assert!(strategy.handles.is_empty());
    }

    #[test]
    fn test_cancelled_workers_are_detected() {
        let plan = partition(10_000, 4).unwrap();
        let mut strategy = Latch::new();
        strategy.setup(&plan).unwrap();
        strategy.cancel.cancel();
        assert!(matches!(strategy.execute(), Err(CountingError::Cancelled)));
        strategy.teardown();
    }

    #[test]
    fn test_teardown_stops_running_workers() {
        let plan = partition(400_000_000, 4).unwrap();
        let mut strategy = Latch::new();
        strategy.setup(&plan).unwrap();

        let Prepared { ranges, latch } = strategy.prepared.take().unwrap();
        for (index, &range) in ranges.iter().enumerate() {
            strategy.spawn_worker(index, range, latch.clone()).unwrap();
        }

        let started = Instant::now();
        strategy.teardown();
        latch.wait();
        assert!(strategy.handles.is_empty());
        assert_eq!(strategy.completed.load(Ordering::Acquire), 0);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_cancellation_during_execute_returns_promptly() {
        let plan = partition(400_000_000, 4).unwrap();
        let mut strategy = Latch::new();
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
        assert!(strategy.handles.is_empty());
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
