//! The benchmark driver.
//!
//! A [`Harness`] runs a fixed number of rounds over one [`PartitionPlan`].
//! Every round builds a fresh instance of each strategy and measures them one
//! after another on the calling thread, never concurrently, so no two
//! strategies compete for the machine while being timed.
//!
//! ```text
//!   round r:  create all ──► for each instance:
//!                              ┌───────────── TeardownGuard ─────────────┐
//!                              │ setup(plan) ─► [timer] execute() [timer] │
//!                              └──────────────── teardown() ─────────────┘
//!                            ──► cross-validate counts ──► fold durations
//! ```
//!
//! Failures are contained: a strategy that returns an error, or panics, in
//! `setup` or `execute` is recorded as failed for that round, still torn down,
//! and the remaining strategies run as usual. Only successful rounds
//! contribute a duration to the statistics.
//!
//! # Example
//!
//! ```rust
//! use primebench::harness::Harness;
//! use primebench::range::partition;
//! use primebench::strategies::{StrategyConfig, StrategyKind};
//!
//! let plan = partition(10_000, 8).unwrap();
//! let harness = Harness::new(plan, StrategyConfig::default()).with_rounds(2);
//!
//! let report = harness.run(&[StrategyKind::Sequential, StrategyKind::Latch]);
//! assert_eq!(report.summaries.len(), 2);
//! assert!(report.summaries.iter().all(|s| s.successes == 2));
//! ```

use std::any::Any;
use std::cmp::Ordering;
use std::fmt::{self, Display};
use std::ops::{Deref, DerefMut};
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::config::BenchmarkConfig;
use crate::error::{CountingError, Result};
use crate::range::{partition, PartitionPlan};
use crate::stats::{AveragingPolicy, RunningStatistics, StrategySummary};
use crate::strategies::{Strategy, StrategyConfig, StrategyFactory};

/// Calls `teardown` when dropped, whatever path left the scope.
struct TeardownGuard<'s> {
    strategy: &'s mut dyn Strategy,
}

impl<'s> TeardownGuard<'s> {
    fn new(strategy: &'s mut dyn Strategy) -> Self {
        Self { strategy }
    }
}

impl<'s> Deref for TeardownGuard<'s> {
    type Target = dyn Strategy + 's;

    fn deref(&self) -> &Self::Target {
        self.strategy
    }
}

impl<'s> DerefMut for TeardownGuard<'s> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.strategy
    }
}

impl Drop for TeardownGuard<'_> {
    fn drop(&mut self) {
        let strategy = &mut *self.strategy;
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| strategy.teardown())) {
            error!(cause = %panic_message(&*payload), "teardown panicked");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Runs one `setup → execute → teardown` cycle, timing `execute` only.
///
/// `teardown` is called exactly once, including when `setup` or `execute`
/// fails or panics. A panic is reported as [`CountingError::Panicked`].
pub fn measure(strategy: &mut dyn Strategy, plan: &PartitionPlan) -> RoundOutcome {
    let mut guard = TeardownGuard::new(strategy);

    let attempt = panic::catch_unwind(AssertUnwindSafe(
        || -> std::result::Result<(Duration, u64), CountingError> {
            guard.setup(plan)?;
            let started = Instant::now();
            let count = guard.execute()?;
            Ok((started.elapsed(), count))
        },
    ));

    match attempt {
        Ok(Ok((duration, count))) => RoundOutcome::Success { duration, count },
        Ok(Err(cause)) => RoundOutcome::Failure(cause),
        Err(payload) => RoundOutcome::Failure(CountingError::Panicked(panic_message(&*payload))),
    }
}

/// What one strategy produced in one round.
#[derive(Debug)]
pub enum RoundOutcome {
    Success { duration: Duration, count: u64 },
    Failure(CountingError),
}

/// The outcome of one strategy in one round.
///
/// Displays as the console line for the round:
///
/// ```text
/// Strategy: latch. Duration: 12. Count: 1229
/// Strategy: pooled. Counting error: counting was cancelled
/// ```
#[derive(Debug)]
pub struct StrategyResult {
    pub strategy: String,
    pub outcome: RoundOutcome,
}

impl StrategyResult {
    pub fn duration(&self) -> Option<Duration> {
        match self.outcome {
            RoundOutcome::Success { duration, .. } => Some(duration),
            RoundOutcome::Failure(_) => None,
        }
    }

    pub fn count(&self) -> Option<u64> {
        match self.outcome {
            RoundOutcome::Success { count, .. } => Some(count),
            RoundOutcome::Failure(_) => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, RoundOutcome::Success { .. })
    }

    /// Orders by duration, fastest first; failures sort last.
    pub fn cmp_by_duration(&self, other: &Self) -> Ordering {
        match (self.duration(), other.duration()) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

impl Display for StrategyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            RoundOutcome::Success { duration, count } => write!(
                f,
                "Strategy: {}. Duration: {}. Count: {}",
                self.strategy,
                duration.as_millis(),
                count
            ),
            RoundOutcome::Failure(cause) => {
                write!(f, "Strategy: {}. Counting error: {}", self.strategy, cause)
            }
        }
    }
}

/// Successful strategies of one round that disagree on the count.
///
/// A data-quality diagnostic; the run continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsistencyViolation {
    pub round: u32,
    /// Every successful strategy with the count it reported.
    pub counts: Vec<(String, u64)>,
}

impl ConsistencyViolation {
    /// Returns a violation if the successful results disagree.
    pub fn check(round: u32, results: &[StrategyResult]) -> Option<Self> {
        let counts: Vec<(String, u64)> = results
            .iter()
            .filter_map(|result| result.count().map(|count| (result.strategy.clone(), count)))
            .collect();

        let first = counts.first()?.1;
        if counts.iter().all(|(_, count)| *count == first) {
            None
        } else {
            Some(Self { round, counts })
        }
    }
}

impl Display for ConsistencyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "round {}: strategies disagree on the count:", self.round)?;
        for (strategy, count) in &self.counts {
            write!(f, " {strategy}={count}")?;
        }
        Ok(())
    }
}

/// Everything that happened in one round.
#[derive(Debug)]
pub struct RoundReport {
    pub round: u32,
    /// Results in the order the strategies were given.
    pub results: Vec<StrategyResult>,
    pub violation: Option<ConsistencyViolation>,
}

impl RoundReport {
    pub fn failures(&self) -> impl Iterator<Item = &StrategyResult> {
        self.results.iter().filter(|result| !result.is_success())
    }
}

/// The finalized outcome of a whole run.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkReport {
    pub rounds: u32,
    pub averaging: AveragingPolicy,
    /// Per-strategy statistics in the order the strategies were given.
    pub summaries: Vec<StrategySummary>,
    /// Number of rounds that produced a consistency violation.
    pub violations: u32,
}

impl BenchmarkReport {
    /// The summaries sorted fastest first.
    pub fn ranking(&self) -> Vec<StrategySummary> {
        let mut ranking = self.summaries.clone();
        ranking.sort_by(StrategySummary::cmp_by_average);
        ranking
    }
}

/// Runs strategies over a partition plan for a number of rounds.
#[derive(Debug, Clone)]
pub struct Harness {
    plan: PartitionPlan,
    config: StrategyConfig,
    rounds: u32,
    averaging: AveragingPolicy,
}

impl Harness {
    /// A harness running a single round, averaging over successful rounds.
    pub fn new(plan: PartitionPlan, config: StrategyConfig) -> Self {
        Self {
            plan,
            config,
            rounds: 1,
            averaging: AveragingPolicy::default(),
        }
    }

    /// Partitions the domain described by `config` and applies its settings.
    pub fn from_config(config: &BenchmarkConfig) -> Result<Self> {
        let plan = partition(config.total_range, config.number_of_ranges)?;
        Ok(Self::new(plan, config.strategy_config())
            .with_rounds(config.rounds)
            .with_averaging(config.averaging))
    }

    pub fn with_rounds(mut self, rounds: u32) -> Self {
        self.rounds = rounds;
        self
    }

    pub fn with_averaging(mut self, averaging: AveragingPolicy) -> Self {
        self.averaging = averaging;
        self
    }

    pub fn plan(&self) -> &PartitionPlan {
        &self.plan
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    /// Runs a single round: fresh instances, measured one after another.
    pub fn run_round<F: StrategyFactory>(&self, round: u32, factories: &[F]) -> RoundReport {
        let instances: Vec<(&str, Box<dyn Strategy>)> = factories
            .iter()
            .map(|factory| (factory.name(), factory.create(&self.config)))
            .collect();

        let mut results = Vec::with_capacity(instances.len());
        for (name, mut strategy) in instances {
            debug!(strategy = name, round, "measuring");
            let outcome = measure(strategy.as_mut(), &self.plan);
            debug!(strategy = name, round, "torn down");

            if let RoundOutcome::Failure(cause) = &outcome {
                error!(strategy = name, round, %cause, "counting failed");
            }
            results.push(StrategyResult {
                strategy: name.to_string(),
                outcome,
            });
        }

        let violation = ConsistencyViolation::check(round, &results);
        if let Some(violation) = &violation {
            warn!(%violation, "consistency violation");
        }

        RoundReport {
            round,
            results,
            violation,
        }
    }

    /// Runs every round and finalizes the statistics.
    pub fn run<F: StrategyFactory>(&self, factories: &[F]) -> BenchmarkReport {
        self.run_with(factories, |_| {})
    }

    /// Like [`run`](Self::run), handing every round's report to `on_round`
    /// as soon as the round completes.
    pub fn run_with<F, C>(&self, factories: &[F], mut on_round: C) -> BenchmarkReport
    where
        F: StrategyFactory,
        C: FnMut(&RoundReport),
    {
        let mut stats = RunningStatistics::new();
        for factory in factories {
            stats.register(factory.name());
        }

        let mut violations = 0;
        for round in 0..self.rounds {
            info!(round, strategies = factories.len(), "starting round");
            let report = self.run_round(round, factories);

            for result in &report.results {
                match result.outcome {
                    RoundOutcome::Success { duration, .. } => {
                        stats.record_success(&result.strategy, duration)
                    }
                    RoundOutcome::Failure(_) => stats.record_failure(&result.strategy),
                }
            }
            if report.violation.is_some() {
                violations += 1;
            }
            on_round(&report);
        }

        let summaries = stats.finalize(self.rounds, self.averaging);
        info!(
            rounds = self.rounds,
            averaging = %self.averaging,
            violations,
            "benchmark finished"
        );

        BenchmarkReport {
            rounds: self.rounds,
            averaging: self.averaging,
            summaries,
            violations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::StrategyKind;
    use std::num::NonZeroUsize;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Arc;

    #[derive(Debug, Clone, Copy)]
    enum Behavior {
        Count(u64),
        Fail,
        Panic,
        FailSetup,
    }

    struct Fake {
        behavior: Behavior,
        teardowns: Arc<AtomicUsize>,
    }

    impl Strategy for Fake {
        fn setup(&mut self, _plan: &PartitionPlan) -> std::result::Result<(), CountingError> {
            match self.behavior {
                Behavior::FailSetup => Err(CountingError::PoolBuild("no pool".to_string())),
                _ => Ok(()),
            }
        }

        fn execute(&mut self) -> std::result::Result<u64, CountingError> {
            match self.behavior {
                Behavior::Count(count) => Ok(count),
                Behavior::Fail => Err(CountingError::Cancelled),
                Behavior::Panic => panic!("boom"),
                Behavior::FailSetup => unreachable!("execute after failed setup"),
            }
        }

        fn teardown(&mut self) {
            self.teardowns.fetch_add(1, AtomicOrdering::SeqCst);
        }
    }

    struct FakeFactory {
        name: &'static str,
        behavior: Behavior,
        teardowns: Arc<AtomicUsize>,
    }

    impl FakeFactory {
        fn new(name: &'static str, behavior: Behavior) -> Self {
            Self {
                name,
                behavior,
                teardowns: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn teardowns(&self) -> usize {
            self.teardowns.load(AtomicOrdering::SeqCst)
        }
    }

    impl StrategyFactory for FakeFactory {
        fn name(&self) -> &str {
            self.name
        }

        fn create(&self, _config: &StrategyConfig) -> Box<dyn Strategy> {
            Box::new(Fake {
                behavior: self.behavior,
                teardowns: Arc::clone(&self.teardowns),
            })
        }
    }

    fn harness(rounds: u32) -> Harness {
        let plan = partition(100, 4).unwrap();
        let config = StrategyConfig::new(NonZeroUsize::new(2).unwrap());
        Harness::new(plan, config).with_rounds(rounds)
    }

    #[test]
    fn test_teardown_runs_once_on_every_path() {
        let factories = [
            FakeFactory::new("ok", Behavior::Count(25)),
            FakeFactory::new("fail", Behavior::Fail),
            FakeFactory::new("panic", Behavior::Panic),
            FakeFactory::new("setup", Behavior::FailSetup),
        ];
        harness(1).run_round(0, &factories);

        for factory in &factories {
            assert_eq!(factory.teardowns(), 1, "{} teardowns", factory.name);
        }
    }

    #[test]
    fn test_failure_does_not_abort_the_round() {
        let factories = [
            FakeFactory::new("first", Behavior::Count(25)),
            FakeFactory::new("broken", Behavior::Panic),
            FakeFactory::new("last", Behavior::Count(25)),
        ];
        let report = harness(1).run_round(0, &factories);

        assert_eq!(report.results.len(), 3);
        assert!(report.results[0].is_success());
        assert!(matches!(
            &report.results[1].outcome,
            RoundOutcome::Failure(CountingError::Panicked(message)) if message == "boom"
        ));
        assert!(report.results[2].is_success());
        assert_eq!(report.failures().count(), 1);
        assert!(report.violation.is_none());
    }

    #[test]
    fn test_disagreement_is_reported() {
        let factories = [
            FakeFactory::new("a", Behavior::Count(25)),
            FakeFactory::new("b", Behavior::Count(24)),
            FakeFactory::new("c", Behavior::Fail),
        ];
        let report = harness(1).run_round(3, &factories);

        let violation = report.violation.expect("violation");
        assert_eq!(violation.round, 3);
        assert_eq!(
            violation.counts,
            vec![("a".to_string(), 25), ("b".to_string(), 24)]
        );
        assert_eq!(
            violation.to_string(),
            "round 3: strategies disagree on the count: a=25 b=24"
        );
    }

    #[test]
    fn test_failures_alone_are_consistent() {
        let factories = [
            FakeFactory::new("a", Behavior::Fail),
            FakeFactory::new("b", Behavior::Count(7)),
        ];
        let report = harness(1).run_round(0, &factories);
        assert!(report.violation.is_none());
    }

    #[test]
    fn test_run_folds_every_round() {
        let factories = [
            FakeFactory::new("steady", Behavior::Count(25)),
            FakeFactory::new("broken", Behavior::Fail),
        ];
        let mut seen = Vec::new();
        let report = harness(3).run_with(&factories, |round| seen.push(round.round));

        assert_eq!(seen, vec![0, 1, 2]);
        assert_eq!(report.rounds, 3);
        assert_eq!(report.violations, 0);

        let steady = &report.summaries[0];
        assert_eq!(steady.strategy, "steady");
        assert_eq!(steady.successes, 3);
        assert!(steady.average_millis.is_some());

        let broken = &report.summaries[1];
        assert_eq!(broken.failures, 3);
        assert_eq!(broken.average_millis, None);

        assert_eq!(factories[0].teardowns(), 3);
        assert_eq!(factories[1].teardowns(), 3);
        assert_eq!(report.ranking()[0].strategy, "steady");
    }

    #[test]
    fn test_outcome_lines() {
        let success = StrategyResult {
            strategy: "latch".to_string(),
            outcome: RoundOutcome::Success {
                duration: Duration::from_millis(12),
                count: 1229,
            },
        };
        assert_eq!(success.to_string(), "Strategy: latch. Duration: 12. Count: 1229");

        let failure = StrategyResult {
            strategy: "pooled".to_string(),
            outcome: RoundOutcome::Failure(CountingError::Cancelled),
        };
        assert_eq!(
            failure.to_string(),
            "Strategy: pooled. Counting error: counting was cancelled"
        );
        assert_eq!(success.cmp_by_duration(&failure), Ordering::Less);
    }

    #[test]
    fn test_real_strategies_agree() {
        let plan = partition(10_000, 8).unwrap();
        let harness = Harness::new(plan, StrategyConfig::new(NonZeroUsize::new(2).unwrap()));
        let report = harness.run_round(0, &StrategyKind::ALL);

        assert!(report.violation.is_none());
        for result in &report.results {
            assert_eq!(result.count(), Some(1229), "{}", result.strategy);
        }
    }

    #[test]
    fn test_mixed_factories_through_references() {
        let fake = FakeFactory::new("fake", Behavior::Count(168));
        let kind = StrategyKind::Sequential;
        let factories: [&dyn StrategyFactory; 2] = [&kind, &fake];

        let plan = partition(1_000, 2).unwrap();
        let report = Harness::new(plan, StrategyConfig::default()).run_round(0, &factories);
        assert!(report.violation.is_none());
        assert_eq!(report.results[0].strategy, "sequential");
    }
}
