//! # primebench - Concurrency Strategies Side by Side
//!
//! A benchmark that runs the same CPU-bound workload, counting the primes in
//! `[1, N]`, through several concurrency-coordination models and compares how
//! long each one takes. The workload and the primality test are identical for
//! every strategy; only the way work is handed out, waited on and summed
//! differs, so the timings expose the overhead of each coordination primitive.
//!
//! ## How a Run Works
//!
//! 1. The domain is split once into a [`PartitionPlan`](range::PartitionPlan)
//!    of contiguous ranges whose sizes cycle through half, one and one and a
//!    half times the average, the last range absorbing the remainder.
//! 2. For every round, the [`Harness`](harness::Harness) builds a fresh
//!    instance of each strategy and drives it through `setup`, a timed
//!    `execute`, and `teardown`. Strategies run one after another, never
//!    concurrently.
//! 3. The counts of all successful strategies in a round are cross-checked;
//!    a disagreement is reported and the run continues.
//! 4. Durations of successful rounds are folded into per-strategy
//!    statistics and averaged after the last round.
//!
//! ```text
//! ┌──────────────┐    ┌─────────────────────── round × N ───────────────────────┐
//! │ partition    │───►│ sequential │ thread-per-range │ latch │ ... │ fork-join │───► averages
//! │ [1, total]   │    └─────────────────────────────────────────────────────────┘
//! └──────────────┘
//! ```
//!
//! ## Available Strategies
//!
//! | Identifier | Type | Coordination |
//! |------------|------|--------------|
//! | `sequential` | [`Sequential`](strategies::sequential::Sequential) | caller thread only |
//! | `thread-per-range` | [`ThreadPerRange`](strategies::thread_per_range::ThreadPerRange) | one thread per range, joined in turn |
//! | `latch` | [`Latch`](strategies::latch::Latch) | one thread per range, one wait on a latch |
//! | `pooled` | [`Pooled`](strategies::pooled::Pooled) | on-demand worker pool, batch wait |
//! | `fork-join` | [`ForkJoin`](strategies::fork_join::ForkJoin) | work stealing, recursive halving |
//! | `future-chain` | [`FutureChain`](strategies::future_chain::FutureChain) | async units summed through a chain |
//! | `credit-stream` | [`CreditStream`](strategies::credit_stream::CreditStream) | publisher/subscriber with credit 1 |
//! | `data-parallel` | [`DataParallel`](strategies::data_parallel::DataParallel) | nested parallel iterators |
//! | `iterator-pool` | [`IteratorPool`](strategies::iterator_pool::IteratorPool) | prepared iterators drained on a pool |
//!
//! ## Quick Start
//!
//! ```rust
//! use primebench::config::BenchmarkConfig;
//! use primebench::harness::Harness;
//! use primebench::strategies::StrategyKind;
//!
//! let config = BenchmarkConfig::builder()
//!     .total_range(20_000)
//!     .number_of_ranges(8)
//!     .rounds(2)
//!     .build()
//!     .unwrap();
//!
//! let strategies = StrategyKind::resolve(["sequential", "fork-join"]).unwrap();
//! let report = Harness::from_config(&config).unwrap().run(&strategies);
//!
//! for summary in report.ranking() {
//!     println!("{}: {:?} ms", summary.strategy, summary.average_millis);
//! }
//! ```
//!
//! ## Observers
//!
//! Final summaries can be rendered with the optional observer modules:
//!
//! | Feature | Module | Description |
//! |---------|--------|-------------|
//! | `table` | [`observers::table`] | Averages as a table, fastest first |
//! | `json` | [`observers::json`] | The whole report as JSON |
//! | `full` | All observers | Enables all observer modules |
//!
//! The `cli` feature builds the `primebench` binary on top of both.

pub mod config;
pub mod error;
pub mod harness;
pub mod observers;
pub mod oracle;
pub mod range;
pub mod stats;
pub mod strategies;
