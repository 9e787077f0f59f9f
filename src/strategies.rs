//! The strategy contract and every coordination model that implements it.
//!
//! A [`Strategy`] counts the primes of a [`PartitionPlan`] using one particular
//! concurrency primitive. All strategies share the same oracle and the same
//! plan; only the way work is handed out, waited on and summed differs.
//!
//! # Lifecycle
//!
//! ```text
//!   factory.create() ──► setup(plan) ──► execute() ──► teardown()
//!                        allocate        count, block  release, cancel
//!                        no counting     the caller    outstanding work
//! ```
//!
//! An instance is single-use: the harness builds a fresh one per round and
//! calls `teardown` exactly once on every exit path. Strategies do not guard
//! against a missing `teardown` themselves.
//!
//! # Available Strategies
//!
//! | Kind | Module | Coordination |
//! |------|--------|--------------|
//! | `sequential` | [`sequential`] | none, caller thread only |
//! | `thread-per-range` | [`thread_per_range`] | one OS thread per range, joined in turn |
//! | `latch` | [`latch`] | one OS thread per range, single wait on a countdown latch |
//! | `pooled` | [`pooled`] | on-demand worker pool, batch wait |
//! | `fork-join` | [`fork_join`] | work-stealing pool, recursive halving |
//! | `future-chain` | [`future_chain`] | async units summed through a left-to-right chain |
//! | `credit-stream` | [`credit_stream`] | publisher/subscriber pairs with one credit at a time |
//! | `data-parallel` | [`data_parallel`] | nested parallel iterators |
//! | `iterator-pool` | [`iterator_pool`] | pre-built iterators drained on the worker pool |

pub mod credit_stream;
pub mod data_parallel;
pub mod fork_join;
pub mod future_chain;
pub mod iterator_pool;
pub mod latch;
pub mod pooled;
pub mod sequential;
pub mod thread_per_range;

mod cached_pool;

use std::fmt::{self, Display};
use std::num::NonZeroUsize;
use std::str::FromStr;

use crate::error::{BenchError, CountingError};
use crate::range::PartitionPlan;

/// A concurrency model for counting the primes of a partition plan.
///
/// # Examples
///
/// ```rust
/// use primebench::range::partition;
/// use primebench::strategies::{Strategy, StrategyConfig, StrategyFactory, StrategyKind};
///
/// let plan = partition(1_000, 4).unwrap();
/// let mut strategy = StrategyKind::Latch.create(&StrategyConfig::default());
///
/// strategy.setup(&plan).unwrap();
/// let count = strategy.execute();
/// strategy.teardown();
///
/// assert_eq!(count.unwrap(), 168);
/// ```
pub trait Strategy {
    /// Allocates the coordination resources for one round.
    ///
    /// Must not start counting. Failures here are reported like counting
    /// failures; `teardown` is still called afterwards.
    fn setup(&mut self, plan: &PartitionPlan) -> Result<(), CountingError>;

    /// Counts the primes of the plan, blocking until the total is known.
    fn execute(&mut self) -> Result<u64, CountingError>;

    /// Releases what `setup` acquired and cancels outstanding work.
    ///
    /// The default does nothing, for strategies that own no resources.
    fn teardown(&mut self) {}
}

/// Parallelism used when the operating system cannot report one.
pub const FALLBACK_PARALLELISM: NonZeroUsize = match NonZeroUsize::new(4) {
    Some(n) => n,
    None => unreachable!(),
};

/// Process-wide settings resolved once and passed to every strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyConfig {
    /// Number of parallel units: pool sizes, publisher/subscriber pairs.
    pub parallelism: NonZeroUsize,
}

impl StrategyConfig {
    pub fn new(parallelism: NonZeroUsize) -> Self {
        Self { parallelism }
    }

    /// Uses the parallelism reported by the operating system, or
    /// [`FALLBACK_PARALLELISM`] if unknown.
    pub fn detect() -> Self {
        let parallelism = std::thread::available_parallelism().unwrap_or(FALLBACK_PARALLELISM);
        Self { parallelism }
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self::detect()
    }
}

/// Builds fresh strategy instances for the harness.
pub trait StrategyFactory {
    /// Identifier used in reports.
    fn name(&self) -> &str;

    /// Creates a new, not yet set up, instance.
    fn create(&self, config: &StrategyConfig) -> Box<dyn Strategy>;
}

impl<F: StrategyFactory + ?Sized> StrategyFactory for &F {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn create(&self, config: &StrategyConfig) -> Box<dyn Strategy> {
        (**self).create(config)
    }
}

/// Every built-in strategy, resolvable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StrategyKind {
    Sequential,
    ThreadPerRange,
    Latch,
    Pooled,
    ForkJoin,
    FutureChain,
    CreditStream,
    DataParallel,
    IteratorPool,
}

impl StrategyKind {
    /// All kinds in their canonical order.
    pub const ALL: [StrategyKind; 9] = [
        StrategyKind::Sequential,
        StrategyKind::ThreadPerRange,
        StrategyKind::Latch,
        StrategyKind::Pooled,
        StrategyKind::ForkJoin,
        StrategyKind::FutureChain,
        StrategyKind::CreditStream,
        StrategyKind::DataParallel,
        StrategyKind::IteratorPool,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Sequential => "sequential",
            StrategyKind::ThreadPerRange => "thread-per-range",
            StrategyKind::Latch => "latch",
            StrategyKind::Pooled => "pooled",
            StrategyKind::ForkJoin => "fork-join",
            StrategyKind::FutureChain => "future-chain",
            StrategyKind::CreditStream => "credit-stream",
            StrategyKind::DataParallel => "data-parallel",
            StrategyKind::IteratorPool => "iterator-pool",
        }
    }

    /// Resolves a list of identifiers.
    ///
    /// `all` expands to every kind. Names are matched case-insensitively and
    /// `_` is accepted in place of `-`. Every unknown name is reported in a
    /// single [`BenchError::UnresolvedStrategy`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use primebench::strategies::StrategyKind;
    ///
    /// let kinds = StrategyKind::resolve(["sequential", "fork_join"]).unwrap();
    /// assert_eq!(kinds, vec![StrategyKind::Sequential, StrategyKind::ForkJoin]);
    ///
    /// assert!(StrategyKind::resolve(["sequential", "warp"]).is_err());
    /// ```
    pub fn resolve<I, S>(names: I) -> Result<Vec<StrategyKind>, BenchError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut kinds = Vec::new();
        let mut missing = Vec::new();

        for name in names {
            let name = name.as_ref();
            if name.eq_ignore_ascii_case("all") {
                kinds.extend(Self::ALL);
                continue;
            }
            match name.parse::<StrategyKind>() {
                Ok(kind) => kinds.push(kind),
                Err(_) => missing.push(name.to_string()),
            }
        }

        if missing.is_empty() {
            Ok(kinds)
        } else {
            Err(BenchError::UnresolvedStrategy { missing })
        }
    }
}

impl Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a name that matches no [`StrategyKind`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown strategy: {0}")]
pub struct UnknownStrategy(pub String);

impl FromStr for StrategyKind {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| UnknownStrategy(s.to_string()))
    }
}

impl StrategyFactory for StrategyKind {
    fn name(&self) -> &str {
        self.as_str()
    }

    fn create(&self, config: &StrategyConfig) -> Box<dyn Strategy> {
        match self {
            StrategyKind::Sequential => Box::new(sequential::Sequential::new()),
            StrategyKind::ThreadPerRange => Box::new(thread_per_range::ThreadPerRange::new()),
            StrategyKind::Latch => Box::new(latch::Latch::new()),
            StrategyKind::Pooled => Box::new(pooled::Pooled::new()),
            StrategyKind::ForkJoin => Box::new(fork_join::ForkJoin::new(config.parallelism)),
            StrategyKind::FutureChain => {
                Box::new(future_chain::FutureChain::new(config.parallelism))
            }
            StrategyKind::CreditStream => {
                Box::new(credit_stream::CreditStream::new(config.parallelism))
            }
            StrategyKind::DataParallel => Box::new(data_parallel::DataParallel::new()),
            StrategyKind::IteratorPool => Box::new(iterator_pool::IteratorPool::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::count_primes_in;
    use crate::range::partition;

    fn run(kind: StrategyKind, plan: &PartitionPlan, parallelism: usize) -> u64 {
        let config = StrategyConfig::new(NonZeroUsize::new(parallelism).unwrap());
        let mut strategy = kind.create(&config);
        strategy.setup(plan).unwrap();
        let count = strategy.execute();
        strategy.teardown();
        count.unwrap()
    }

    #[test]
    fn test_every_strategy_matches_sequential() {
        let plan = partition(10_000, 8).unwrap();
        let expected = run(StrategyKind::Sequential, &plan, 4);
        assert_eq!(expected, 1229);

        for kind in StrategyKind::ALL {
            assert_eq!(run(kind, &plan, 4), expected, "{kind} disagrees");
        }
    }

    #[test]
    fn test_every_strategy_handles_single_range() {
        let plan = partition(2_500, 1).unwrap();
        let expected = count_primes_in(&plan);
        for kind in StrategyKind::ALL {
            assert_eq!(run(kind, &plan, 2), expected, "{kind} disagrees");
        }
    }

    #[test]
    fn test_every_strategy_handles_more_ranges_than_parallelism() {
        let plan = partition(3_000, 13).unwrap();
        let expected = count_primes_in(&plan);
        for kind in StrategyKind::ALL {
            assert_eq!(run(kind, &plan, 3), expected, "{kind} disagrees");
        }
    }

    #[test]
    fn test_every_strategy_tolerates_teardown_without_execute() {
        let plan = partition(100, 4).unwrap();
        for kind in StrategyKind::ALL {
            let mut strategy = kind.create(&StrategyConfig::default());
            strategy.setup(&plan).unwrap();
            strategy.teardown();
        }
    }

    #[test]
    fn test_execute_before_setup_fails() {
        for kind in StrategyKind::ALL {
            let mut strategy = kind.create(&StrategyConfig::default());
            assert!(
                matches!(strategy.execute(), Err(CountingError::NotSetUp)),
                "{kind} counted without setup"
            );
            strategy.teardown();
        }
    }

    #[test]
    fn test_detect_falls_back_to_four() {
        assert_eq!(FALLBACK_PARALLELISM.get(), 4);
        let detected = StrategyConfig::detect().parallelism;
        let reported = std::thread::available_parallelism().unwrap_or(FALLBACK_PARALLELISM);
        assert_eq!(detected, reported);
    }

    #[test]
    fn test_names_round_trip() {
        for kind in StrategyKind::ALL {
            assert_eq!(kind.as_str().parse::<StrategyKind>().unwrap(), kind);
        }
        assert_eq!(
            "FORK_JOIN".parse::<StrategyKind>().unwrap(),
            StrategyKind::ForkJoin
        );
    }

    #[test]
    fn test_resolve_all() {
        let kinds = StrategyKind::resolve(["all"]).unwrap();
        assert_eq!(kinds, StrategyKind::ALL.to_vec());
    }

    #[test]
    fn test_resolve_reports_every_missing_name() {
        let err = StrategyKind::resolve(["latch", "warp", "pooled", "turbo"]).unwrap_err();
        match err {
            BenchError::UnresolvedStrategy { missing } => {
                assert_eq!(missing, vec!["warp".to_string(), "turbo".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
