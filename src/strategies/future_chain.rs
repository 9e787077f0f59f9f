//! Asynchronous units combined through a single left-to-right chain.
//!
//! `setup` builds the whole task graph on a private multi-threaded runtime:
//! one unit per range plus one link per range. Link `i` waits on link `i - 1`
//! and on unit `i` and yields their sum. The first link is a seed that only
//! resolves when `execute` sends it `0`; every unit also waits on that seed,
//! so nothing is counted before `execute`.
//!
//! ```text
//!   seed(0) ──► link 0 ──► link 1 ──► ... ──► link n   ◄── execute blocks here
//!                 ▲          ▲                  ▲
//!               unit 0     unit 1             unit n
//! ```
//!
//! The units run concurrently on the runtime's work-stealing workers, but the
//! summation is serialized in chain order.

use std::num::NonZeroUsize;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::runtime::{Builder, Runtime};
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};
use tracing::debug;

use crate::error::CountingError;
use crate::oracle::{count_primes_until_cancelled, CancelToken};
use crate::range::PartitionPlan;
use crate::strategies::Strategy;

/// How long teardown waits for runtime tasks to observe cancellation.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

type Seed = Shared<BoxFuture<'static, Option<u64>>>;
type Link = JoinHandle<Result<u64, CountingError>>;

/// Sums per-range async units through a chain of links.
pub struct FutureChain {
    parallelism: NonZeroUsize,
    runtime: Option<Runtime>,
    seed: Option<oneshot::Sender<u64>>,
    tip: Option<Link>,
    cancel: CancelToken,
}

impl FutureChain {
    pub fn new(parallelism: NonZeroUsize) -> Self {
        Self {
            parallelism,
            runtime: None,
            seed: None,
            tip: None,
            cancel: CancelToken::new(),
        }
    }
}

fn join_failure(task: String, err: JoinError) -> CountingError {
    if err.is_panic() {
        CountingError::WorkerPanicked { worker: task }
    } else if err.is_cancelled() {
        CountingError::Cancelled
    } else {
        CountingError::TaskFailed(err.to_string())
    }
}

async fn joined(handle: Link, task: String) -> Result<u64, CountingError> {
    match handle.await {
        Ok(result) => result,
        Err(err) => Err(join_failure(task, err)),
    }
}

fn build_chain(runtime: &Runtime, plan: &PartitionPlan, seed: Seed, cancel: &CancelToken) -> Link {
    let root = seed.clone();
    let mut tip: Link = runtime.spawn(async move { root.await.ok_or(CountingError::ChainBroken) });

    for (index, &range) in plan.iter().enumerate() {
        let trigger = seed.clone();
        let cancel = cancel.clone();
        // CPU-bound on purpose: units occupy runtime workers like any other task.
        let unit: Link = runtime.spawn(async move {
            trigger.await.ok_or(CountingError::ChainBroken)?;
            count_primes_until_cancelled(range, &cancel)
        });

        let left = tip;
        tip = runtime.spawn(async move {
            let (left, own) = futures::try_join!(
                joined(left, format!("future-chain-link-{index}")),
                joined(unit, format!("future-chain-unit-{index}")),
            )?;
            Ok(left + own)
        });
    }

    tip
}

impl Strategy for FutureChain {
    fn setup(&mut self, plan: &PartitionPlan) -> Result<(), CountingError> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(self.parallelism.get())
            .thread_name("future-chain")
            .build()
            .map_err(CountingError::Spawn)?;

        let (seed_tx, seed_rx) = oneshot::channel::<u64>();
        let seed: Seed = seed_rx.map(Result::ok).boxed().shared();

        self.tip = Some(build_chain(&runtime, plan, seed, &self.cancel));
        self.seed = Some(seed_tx);
        self.runtime = Some(runtime);
        Ok(())
    }

    fn execute(&mut self) -> Result<u64, CountingError> {
        let (Some(runtime), Some(seed), Some(tip)) =
            (self.runtime.as_ref(), self.seed.take(), self.tip.take())
        else {
            return Err(CountingError::NotSetUp);
        };

        seed.send(0).map_err(|_| CountingError::ChainBroken)?;
        runtime.block_on(joined(tip, "future-chain-tip".to_string()))
    }

    fn teardown(&mut self) {
        self.cancel.cancel();
        // Dropping the seed sender releases any unit still waiting on it.
        self.seed = None;
        self.tip = None;
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_timeout(SHUTDOWN_GRACE);
            debug!("future-chain runtime shut down");
        }
    }
}
