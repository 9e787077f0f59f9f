//! A worker pool that grows on demand.
//!
//! Tasks run on the blocking pool of a private current-thread tokio runtime.
//! The blocking pool starts a new thread whenever no idle one is available,
//! so a batch of `n` submissions ends up running on up to `n` threads, and
//! idle threads are kept for the next batch.
//!
//! Shutdown drops tasks that have not started and waits a bounded time for
//! the running ones. Running tasks are not interrupted by the pool; callers
//! pair it with a [`CancelToken`](crate::oracle::CancelToken) checked by the
//! tasks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{self, FutureExt};
use tokio::runtime::{Builder, Runtime};
use tracing::trace;

use crate::error::CountingError;

/// Upper bound on threads a single pool may start.
const MAX_WORKERS: usize = 512;

/// How long shutdown waits for running tasks to observe cancellation.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Counters {
    /// Threads currently alive in the blocking pool.
    live: AtomicUsize,
    /// Tasks submitted but not yet started.
    queued: AtomicUsize,
}

pub(crate) struct CachedPool {
    name: &'static str,
    runtime: Option<Runtime>,
    counters: Arc<Counters>,
    shutdown: bool,
}

impl CachedPool {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            runtime: None,
            counters: Arc::default(),
            shutdown: false,
        }
    }

    /// Number of worker threads the pool currently holds.
    pub(crate) fn workers(&self) -> usize {
        if self.runtime.is_some() {
            self.counters.live.load(Ordering::Acquire)
        } else {
            0
        }
    }

    fn runtime(&mut self) -> Result<&Runtime, CountingError> {
        if self.shutdown {
            return Err(CountingError::Cancelled);
        }
        let runtime = match self.runtime.take() {
            Some(runtime) => runtime,
            None => {
                let started = Arc::clone(&self.counters);
                let stopped = Arc::clone(&self.counters);
                Builder::new_current_thread()
                    .max_blocking_threads(MAX_WORKERS)
                    .thread_name(self.name)
                    .on_thread_start(move || {
                        started.live.fetch_add(1, Ordering::AcqRel);
                    })
                    .on_thread_stop(move || {
                        stopped.live.fetch_sub(1, Ordering::AcqRel);
                    })
                    .build()
                    .map_err(CountingError::Spawn)?
            }
        };
        Ok(&*self.runtime.insert(runtime))
    }

    /// Submits every task and blocks until all of them have completed.
    ///
    /// Results come back in submission order. The first task that fails or
    /// panics fails the whole batch right away; its siblings keep running
    /// until they observe cancellation or the pool shuts down.
    pub(crate) fn invoke_all<T, F>(&mut self, tasks: Vec<F>) -> Result<Vec<T>, CountingError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, CountingError> + Send + 'static,
    {
        let name = self.name;
        let counters = Arc::clone(&self.counters);
        let runtime = self.runtime()?;

        let batch: Vec<_> = tasks
            .into_iter()
            .enumerate()
            .map(|(index, task)| {
                counters.queued.fetch_add(1, Ordering::AcqRel);
                let counters = Arc::clone(&counters);
                runtime
                    .spawn_blocking(move || {
                        counters.queued.fetch_sub(1, Ordering::AcqRel);
                        task()
                    })
                    .map(move |joined| match joined {
                        Ok(result) => result,
                        Err(err) if err.is_panic() => Err(CountingError::WorkerPanicked {
                            worker: format!("{name}-task-{index}"),
                        }),
                        Err(_) => Err(CountingError::Cancelled),
                    })
            })
            .collect();

        runtime.block_on(future::try_join_all(batch))
    }

    /// Drops tasks that have not started, then waits for the running ones
    /// and for every worker thread to exit.
    ///
    /// Returns how many queued tasks were dropped. Safe to call repeatedly.
    pub(crate) fn shutdown_now(&mut self) -> usize {
        self.shutdown = true;
        let Some(runtime) = self.runtime.take() else {
            return 0;
        };

        let discarded = self.counters.queued.swap(0, Ordering::AcqRel);
        runtime.shutdown_timeout(SHUTDOWN_GRACE);
        trace!(pool = self.name, discarded, "pool shut down");
        discarded
    }
}

impl Drop for CachedPool {
    fn drop(&mut self) {
        self.shutdown_now();
    }
}
