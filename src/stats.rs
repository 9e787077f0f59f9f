//! Per-strategy timing statistics accumulated across rounds.
//!
//! Durations are folded in as rounds complete; averages are only computed by
//! [`RunningStatistics::finalize`], after the last round, and are rounded to
//! one decimal place of a millisecond.
//!
//! # Averaging divisor
//!
//! A failed round contributes no duration. Whether the running sum is then
//! divided by the number of successful rounds or by the configured number of
//! rounds is chosen with [`AveragingPolicy`]:
//!
//! ```text
//!   rounds: 100 ms, FAIL, 300 ms
//!
//!   SuccessfulRounds   (100 + 300) / 2 = 200.0
//!   ConfiguredRounds   (100 + 300) / 3 = 133.3
//! ```

use std::cmp::Ordering;
use std::fmt::{self, Display};
use std::str::FromStr;
use std::time::Duration;

/// Which divisor turns a strategy's summed duration into its average.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum AveragingPolicy {
    /// Divide by the rounds in which the strategy succeeded.
    #[default]
    SuccessfulRounds,
    /// Divide by the configured round count, failed rounds included.
    ConfiguredRounds,
}

impl AveragingPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AveragingPolicy::SuccessfulRounds => "successful-rounds",
            AveragingPolicy::ConfiguredRounds => "configured-rounds",
        }
    }
}

impl Display for AveragingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AveragingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "successful-rounds" | "successful" => Ok(AveragingPolicy::SuccessfulRounds),
            "configured-rounds" | "configured" => Ok(AveragingPolicy::ConfiguredRounds),
            other => Err(format!("unknown averaging policy: {other}")),
        }
    }
}

/// Rounds a millisecond value to one decimal place.
pub fn round_tenth(millis: f64) -> f64 {
    (millis * 10.0).round() / 10.0
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Running totals for one strategy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyStats {
    total: Duration,
    successes: u32,
    failures: u32,
    min: Option<Duration>,
    max: Option<Duration>,
}

impl StrategyStats {
    pub fn record_success(&mut self, duration: Duration) {
        self.total += duration;
        self.successes += 1;
        self.min = Some(self.min.map_or(duration, |min| min.min(duration)));
        self.max = Some(self.max.map_or(duration, |max| max.max(duration)));
    }

    pub fn record_failure(&mut self) {
        self.failures += 1;
    }

    pub fn successes(&self) -> u32 {
        self.successes
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Average in milliseconds, rounded to one decimal.
    ///
    /// `None` when the strategy never succeeded.
    pub fn average_millis(&self, policy: AveragingPolicy, rounds: u32) -> Option<f64> {
        if self.successes == 0 {
            return None;
        }
        let divisor = match policy {
            AveragingPolicy::SuccessfulRounds => self.successes,
            AveragingPolicy::ConfiguredRounds => rounds.max(self.successes),
        };
        Some(round_tenth(millis(self.total) / f64::from(divisor)))
    }
}

/// The finalized statistics of one strategy.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StrategySummary {
    pub strategy: String,
    /// Average duration in milliseconds; absent if every round failed.
    pub average_millis: Option<f64>,
    pub min_millis: Option<f64>,
    pub max_millis: Option<f64>,
    pub successes: u32,
    pub failures: u32,
}

impl StrategySummary {
    /// Orders by average duration, fastest first; strategies without an
    /// average sort last.
    pub fn cmp_by_average(&self, other: &Self) -> Ordering {
        match (self.average_millis, other.average_millis) {
            (Some(a), Some(b)) => a.total_cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

/// Statistics for every strategy of a run, in registration order.
#[derive(Debug, Clone, Default)]
pub struct RunningStatistics {
    entries: Vec<(String, StrategyStats)>,
}

impl RunningStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, strategy: &str) -> &mut StrategyStats {
        let position = match self.entries.iter().position(|(name, _)| name == strategy) {
            Some(position) => position,
            None => {
                self.entries.push((strategy.to_string(), StrategyStats::default()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[position].1
    }

    /// Makes sure `strategy` appears in the summary even if it never succeeds.
    pub fn register(&mut self, strategy: &str) {
        self.entry(strategy);
    }

    pub fn record_success(&mut self, strategy: &str, duration: Duration) {
        self.entry(strategy).record_success(duration);
    }

    pub fn record_failure(&mut self, strategy: &str) {
        self.entry(strategy).record_failure();
    }

    pub fn get(&self, strategy: &str) -> Option<&StrategyStats> {
        self.entries
            .iter()
            .find(|(name, _)| name == strategy)
            .map(|(_, stats)| stats)
    }

    /// Computes the final summaries, in registration order.
    pub fn finalize(&self, rounds: u32, policy: AveragingPolicy) -> Vec<StrategySummary> {
        self.entries
            .iter()
            .map(|(strategy, stats)| StrategySummary {
                strategy: strategy.clone(),
                average_millis: stats.average_millis(policy, rounds),
                min_millis: stats.min.map(|d| round_tenth(millis(d))),
                max_millis: stats.max.map(|d| round_tenth(millis(d))),
                successes: stats.successes,
                failures: stats.failures,
            })
            .collect()
    }
}
