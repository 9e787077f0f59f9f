//! JSON observer for exporting benchmark results.
//!
//! [`JsonObserver`] turns a [`BenchmarkReport`] into a [`ReportSnapshot`] and
//! serializes it with serde.
//!
//! # Examples
//!
//! ```rust
//! use primebench::harness::Harness;
//! use primebench::observers::json::{JsonObserver, ReportSnapshot};
//! use primebench::range::partition;
//! use primebench::strategies::{StrategyConfig, StrategyKind};
//!
//! let harness = Harness::new(partition(1_000, 4).unwrap(), StrategyConfig::default());
//! let report = harness.run(&[StrategyKind::Sequential]);
//!
//! let json = JsonObserver::new().to_json(&report).unwrap();
//! let snapshot: ReportSnapshot = serde_json::from_str(&json).unwrap();
//! assert_eq!(snapshot.strategies[0].strategy, "sequential");
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::harness::BenchmarkReport;
use crate::stats::{AveragingPolicy, StrategySummary};

/// Serializable form of a finished run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportSnapshot {
    /// Optional timestamp in milliseconds since Unix epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<u64>,
    pub rounds: u32,
    pub averaging: AveragingPolicy,
    /// Rounds in which successful strategies disagreed on the count.
    pub violations: u32,
    pub strategies: Vec<StrategySummary>,
}

impl ReportSnapshot {
    pub fn new(report: &BenchmarkReport, strategies: Vec<StrategySummary>) -> Self {
        Self {
            timestamp_ms: None,
            rounds: report.rounds,
            averaging: report.averaging,
            violations: report.violations,
            strategies,
        }
    }

    pub fn with_timestamp(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }

    /// Finds a strategy by name.
    pub fn get(&self, strategy: &str) -> Option<&StrategySummary> {
        self.strategies.iter().find(|s| s.strategy == strategy)
    }
}

/// Configuration for the JSON observer.
#[derive(Debug, Clone, Default)]
struct JsonConfig {
    pretty: bool,
    include_timestamp: bool,
    /// Order strategies fastest first instead of in run order.
    sorted: bool,
}

/// Serializes benchmark reports to JSON.
#[derive(Debug, Clone, Default)]
pub struct JsonObserver {
    config: JsonConfig,
}

impl JsonObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pretty(mut self, enabled: bool) -> Self {
        self.config.pretty = enabled;
        self
    }

    pub fn include_timestamp(mut self, enabled: bool) -> Self {
        self.config.include_timestamp = enabled;
        self
    }

    pub fn sorted(mut self, enabled: bool) -> Self {
        self.config.sorted = enabled;
        self
    }

    /// Builds the snapshot that [`to_json`](Self::to_json) serializes.
    pub fn collect(&self, report: &BenchmarkReport) -> ReportSnapshot {
        let strategies = if self.config.sorted {
            report.ranking()
        } else {
            report.summaries.clone()
        };

        let snapshot = ReportSnapshot::new(report, strategies);
        if self.config.include_timestamp {
            snapshot.with_timestamp(current_timestamp_ms())
        } else {
            snapshot
        }
    }

    pub fn to_json(&self, report: &BenchmarkReport) -> Result<String> {
        let snapshot = self.collect(report);
        let json = if self.config.pretty {
            serde_json::to_string_pretty(&snapshot)?
        } else {
            serde_json::to_string(&snapshot)?
        };
        Ok(json)
    }
}

fn current_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
