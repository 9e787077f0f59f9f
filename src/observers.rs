//! Renderers for the final benchmark summary.
//!
//! - [`table`] - Pretty-print per-strategy statistics using the `tabled` crate
//! - [`json`] - Serialize a whole [`BenchmarkReport`](crate::harness::BenchmarkReport) to JSON
//!
//! Both observers only read finalized
//! [`StrategySummary`](crate::stats::StrategySummary) values; they never see a
//! running round.
//!
//! # Feature Flags
//!
//! - `table` - Enables the [`table`] module
//! - `json` - Enables the [`json`] module
//! - `full` - Enables both

#[cfg(feature = "table")]
pub mod table;

#[cfg(feature = "json")]
pub mod json;
