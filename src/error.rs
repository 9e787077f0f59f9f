//! Error taxonomy for partitioning, counting and whole benchmark runs.
//!
//! Three layers of errors exist:
//!
//! - [`PartitionError`] - a malformed partition request, fatal before any round starts
//! - [`CountingError`] - a strategy's coordination failed during `setup` or `execute`;
//!   recorded per round and never propagated past the harness
//! - [`BenchError`] - anything that aborts a run before work starts
//!
//! A disagreement between strategies is not an error at all: it is reported as a
//! [`ConsistencyViolation`](crate::harness::ConsistencyViolation) and the run continues.

use std::io;

use thiserror::Error;

/// Returned by the partitioner when the domain cannot be split as requested.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartitionError {
    /// Zero ranges were requested.
    #[error("number of ranges must be positive")]
    NoRanges,

    /// The domain `[1, total]` is empty.
    #[error("total range must be positive")]
    EmptyDomain,

    /// More ranges than integers in the domain.
    #[error("cannot split {total} numbers into {ranges} non-empty ranges")]
    TooManyRanges { total: u64, ranges: usize },
}

/// Failure of a strategy's internal coordination.
///
/// Each variant names the root cause. Causes that come from another library
/// (thread spawning, runtime creation) are kept as the error source.
#[derive(Debug, Error)]
pub enum CountingError {
    /// Outstanding work observed a cancellation request.
    #[error("counting was cancelled")]
    Cancelled,

    /// A worker thread or task panicked before reporting its count.
    #[error("worker {worker} panicked")]
    WorkerPanicked { worker: String },

    /// A thread or runtime could not be created.
    #[error("could not spawn worker")]
    Spawn(#[source] io::Error),

    /// The work-stealing pool could not be built.
    #[error("could not build thread pool: {0}")]
    PoolBuild(String),

    /// An asynchronous task failed to complete.
    #[error("asynchronous task failed: {0}")]
    TaskFailed(String),

    /// The future chain lost its seed or one of its links.
    #[error("future chain was broken before resolving")]
    ChainBroken,

    /// A subscriber went away without signalling completion.
    #[error("subscriber {subscriber} dropped its completion signal")]
    SubscriberLost { subscriber: usize },

    /// The latch was released although not every worker reported.
    #[error("only {completed} of {expected} workers completed")]
    Incomplete { expected: usize, completed: usize },

    /// The strategy itself panicked on the calling thread.
    #[error("strategy panicked: {0}")]
    Panicked(String),

    /// `execute` was called without a successful `setup`.
    #[error("strategy was not set up")]
    NotSetUp,
}

/// Errors that abort a benchmark run before any round starts.
#[derive(Debug, Error)]
pub enum BenchError {
    /// The partition plan could not be built.
    #[error("invalid partition: {0}")]
    InvalidPartition(#[from] PartitionError),

    /// One or more strategy identifiers are unknown.
    #[error("unresolved strategies: {}", .missing.join(", "))]
    UnresolvedStrategy { missing: Vec<String> },

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Error from the JSON observer.
    #[cfg(feature = "json")]
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for run-level operations.
pub type Result<T> = std::result::Result<T, BenchError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_unresolved_lists_every_name() {
        let err = BenchError::UnresolvedStrategy {
            missing: vec!["warp".to_string(), "turbo".to_string()],
        };
        assert_eq!(err.to_string(), "unresolved strategies: warp, turbo");
    }

    #[test]
    fn test_partition_error_converts() {
        let err: BenchError = PartitionError::NoRanges.into();
        assert!(matches!(err, BenchError::InvalidPartition(PartitionError::NoRanges)));
        assert!(err.to_string().contains("positive"));
    }

    #[test]
    fn test_spawn_keeps_source() {
        let err = CountingError::Spawn(io::Error::new(io::ErrorKind::Other, "no threads"));
        let source = err.source().expect("source is kept");
        assert_eq!(source.to_string(), "no threads");
    }
}
