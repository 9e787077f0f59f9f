//! Validated benchmark configuration.
//!
//! Parallelism is looked up once, when the configuration is built, and then
//! handed to every strategy through [`StrategyConfig`].
//!
//! ```rust
//! use primebench::config::BenchmarkConfig;
//! use primebench::stats::AveragingPolicy;
//!
//! let config = BenchmarkConfig::builder()
//!     .number_of_ranges(8)
//!     .total_range(100_000)
//!     .rounds(3)
//!     .parallelism(4)
//!     .averaging(AveragingPolicy::ConfiguredRounds)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.average_range_size(), 12_500);
//! ```

use std::num::NonZeroUsize;

use crate::error::{BenchError, PartitionError, Result};
use crate::stats::AveragingPolicy;
use crate::strategies::StrategyConfig;

/// Parameters of one benchmark run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkConfig {
    /// How many ranges the domain is split into.
    pub number_of_ranges: usize,
    /// Upper bound of the domain `[1, total_range]`.
    pub total_range: u64,
    /// Rounds to run; every strategy is measured once per round.
    pub rounds: u32,
    /// Parallel units for pools and publisher/subscriber pairs.
    pub parallelism: usize,
    pub averaging: AveragingPolicy,
}

impl BenchmarkConfig {
    pub fn builder() -> BenchmarkConfigBuilder {
        BenchmarkConfigBuilder::new()
    }

    /// Integer average size of a range.
    pub fn average_range_size(&self) -> u64 {
        match self.number_of_ranges {
            0 => 0,
            ranges => self.total_range / ranges as u64,
        }
    }

    /// The settings passed to every strategy instance.
    pub fn strategy_config(&self) -> StrategyConfig {
        StrategyConfig::new(NonZeroUsize::new(self.parallelism).unwrap_or(NonZeroUsize::MIN))
    }

    /// Checks every parameter, including whether the domain can be partitioned.
    pub fn validate(&self) -> Result<()> {
        if self.number_of_ranges == 0 {
            return Err(PartitionError::NoRanges.into());
        }
        if self.total_range == 0 {
            return Err(PartitionError::EmptyDomain.into());
        }
        if self.total_range < self.number_of_ranges as u64 {
            return Err(PartitionError::TooManyRanges {
                total: self.total_range,
                ranges: self.number_of_ranges,
            }
            .into());
        }
        if self.rounds == 0 {
            return Err(BenchError::InvalidConfig(
                "rounds must be at least 1".to_string(),
            ));
        }
        if self.parallelism == 0 {
            return Err(BenchError::InvalidConfig(
                "parallelism must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`BenchmarkConfig`].
#[derive(Debug, Clone)]
pub struct BenchmarkConfigBuilder {
    config: BenchmarkConfig,
}

impl BenchmarkConfigBuilder {
    /// Starts from 8 ranges over `[1, 10000]`, one round, and the detected
    /// parallelism of the machine.
    pub fn new() -> Self {
        Self {
            config: BenchmarkConfig {
                number_of_ranges: 8,
                total_range: 10_000,
                rounds: 1,
                parallelism: StrategyConfig::detect().parallelism.get(),
                averaging: AveragingPolicy::default(),
            },
        }
    }

    pub fn number_of_ranges(mut self, ranges: usize) -> Self {
        self.config.number_of_ranges = ranges;
        self
    }

    pub fn total_range(mut self, total: u64) -> Self {
        self.config.total_range = total;
        self
    }

    pub fn rounds(mut self, rounds: u32) -> Self {
        self.config.rounds = rounds;
        self
    }

    pub fn parallelism(mut self, parallelism: usize) -> Self {
        self.config.parallelism = parallelism;
        self
    }

    pub fn averaging(mut self, averaging: AveragingPolicy) -> Self {
        self.config.averaging = averaging;
        self
    }

    /// Build the configuration, validating it first.
    pub fn build(self) -> Result<BenchmarkConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for BenchmarkConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
