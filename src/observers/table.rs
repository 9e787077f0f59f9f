//! Table observer for pretty-printing strategy summaries.
//!
//! [`TableObserver`] renders finalized [`StrategySummary`] values as a table,
//! fastest strategy first unless told otherwise.
//!
//! # Examples
//!
//! ## Standard format
//!
//! ```text
//! ╭──────────────┬──────────────┬──────────┬──────────┬──────┬──────────╮
//! │ Strategy     │ Average (ms) │ Min (ms) │ Max (ms) │ Runs │ Failures │
//! ├──────────────┼──────────────┼──────────┼──────────┼──────┼──────────┤
//! │ fork-join    │ 41.2         │ 40.8     │ 41.9     │ 3    │ 0        │
//! │ sequential   │ 160.5        │ 159.9    │ 161.0    │ 3    │ 0        │
//! │ pooled       │ -            │ -        │ -        │ 0    │ 3        │
//! ╰──────────────┴──────────────┴──────────┴──────────┴──────┴──────────╯
//! ```
//!
//! ## Compact format
//!
//! ```text
//! ╭─────────────────┬──────────────────┬───────────────────╮
//! │ fork-join: 41.2 │ latch: 52.7      │ sequential: 160.5 │
//! ╰─────────────────┴──────────────────┴───────────────────╯
//! ```

use std::fmt::{self, Display};

use tabled::{builder::Builder, settings::Style, Table, Tabled};

use crate::stats::StrategySummary;

/// Available table styles for rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TableStyle {
    /// ASCII table with simple characters: +, -, |
    Ascii,
    /// Modern rounded corners (default)
    #[default]
    Rounded,
    Sharp,
    Modern,
    /// GitHub-flavored Markdown table
    Markdown,
    Dots,
    /// No borders, just spacing
    Blank,
}

/// Separator between strategy and average in compact mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompactSeparator {
    /// "name: value"
    #[default]
    Colon,
    /// "name = value"
    Equals,
    /// "name → value"
    Arrow,
    /// "name | value"
    Pipe,
}

impl CompactSeparator {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompactSeparator::Colon => ": ",
            CompactSeparator::Equals => " = ",
            CompactSeparator::Arrow => " → ",
            CompactSeparator::Pipe => " | ",
        }
    }
}

/// Configuration for the table observer.
#[derive(Debug, Clone)]
struct TableConfig {
    style: TableStyle,
    /// Whether to show the header row (standard mode only).
    show_header: bool,
    title: Option<String>,
    /// Sort fastest first instead of keeping the run order.
    sorted: bool,
    /// Whether to use compact format (`strategy: average` cells).
    compact: bool,
    /// Number of columns in compact mode.
    columns: usize,
    separator: CompactSeparator,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            style: TableStyle::default(),
            show_header: true,
            title: None,
            sorted: true,
            compact: false,
            columns: 3,
            separator: CompactSeparator::default(),
        }
    }
}

/// Placeholder for a value that does not exist, e.g. the average of a
/// strategy that never succeeded.
const MISSING: &str = "-";

struct Millis(Option<f64>);

impl Display for Millis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(value) => write!(f, "{value:.1}"),
            None => f.write_str(MISSING),
        }
    }
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Strategy")]
    strategy: String,
    #[tabled(rename = "Average (ms)")]
    average: String,
    #[tabled(rename = "Min (ms)")]
    min: String,
    #[tabled(rename = "Max (ms)")]
    max: String,
    #[tabled(rename = "Runs")]
    successes: u32,
    #[tabled(rename = "Failures")]
    failures: u32,
}

impl From<&StrategySummary> for SummaryRow {
    fn from(summary: &StrategySummary) -> Self {
        Self {
            strategy: summary.strategy.clone(),
            average: Millis(summary.average_millis).to_string(),
            min: Millis(summary.min_millis).to_string(),
            max: Millis(summary.max_millis).to_string(),
            successes: summary.successes,
            failures: summary.failures,
        }
    }
}

/// Renders strategy summaries as a formatted table.
///
/// # Examples
///
/// ```rust
/// use primebench::observers::table::{TableObserver, TableStyle};
/// use primebench::stats::StrategySummary;
///
/// let summary = StrategySummary {
///     strategy: "latch".to_string(),
///     average_millis: Some(12.5),
///     min_millis: Some(12.0),
///     max_millis: Some(13.0),
///     successes: 2,
///     failures: 0,
/// };
///
/// let output = TableObserver::new()
///     .with_style(TableStyle::Ascii)
///     .with_title("Averages")
///     .render([&summary]);
///
/// assert!(output.starts_with("Averages"));
/// assert!(output.contains("12.5"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct TableObserver {
    config: TableConfig,
}

impl TableObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_style(mut self, style: TableStyle) -> Self {
        self.config.style = style;
        self
    }

    pub fn with_header(mut self, show: bool) -> Self {
        self.config.show_header = show;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.config.title = Some(title.into());
        self
    }

    /// Keeps the order the summaries are given in when `false`.
    pub fn sorted(mut self, enabled: bool) -> Self {
        self.config.sorted = enabled;
        self
    }

    pub fn compact(mut self, enabled: bool) -> Self {
        self.config.compact = enabled;
        self
    }

    /// Values less than 1 are treated as 1.
    pub fn columns(mut self, count: usize) -> Self {
        self.config.columns = count.max(1);
        self
    }

    pub fn separator(mut self, separator: CompactSeparator) -> Self {
        self.config.separator = separator;
        self
    }

    fn apply_style(&self, table: &mut Table) {
        match self.config.style {
            TableStyle::Ascii => {
                table.with(Style::ascii());
            }
            TableStyle::Rounded => {
                table.with(Style::rounded());
            }
            TableStyle::Sharp => {
                table.with(Style::sharp());
            }
            TableStyle::Modern => {
                table.with(Style::modern());
            }
            TableStyle::Markdown => {
                table.with(Style::markdown());
            }
            TableStyle::Dots => {
                table.with(Style::dots());
            }
            TableStyle::Blank => {
                table.with(Style::blank());
            }
        }
    }

    fn titled(&self, table: Table) -> String {
        match &self.config.title {
            Some(title) => format!("{title}\n{table}"),
            None => table.to_string(),
        }
    }

    fn ordered<'a>(&self, summaries: impl IntoIterator<Item = &'a StrategySummary>) -> Vec<&'a StrategySummary> {
        let mut summaries: Vec<_> = summaries.into_iter().collect();
        if self.config.sorted {
            summaries.sort_by(|a, b| a.cmp_by_average(b));
        }
        summaries
    }

    fn render_compact(&self, summaries: &[&StrategySummary]) -> String {
        if summaries.is_empty() {
            return String::new();
        }

        let cells: Vec<String> = summaries
            .iter()
            .map(|summary| {
                format!(
                    "{}{}{}",
                    summary.strategy,
                    self.config.separator.as_str(),
                    Millis(summary.average_millis)
                )
            })
            .collect();

        let columns = self.config.columns;
        let mut builder = Builder::default();
        for chunk in cells.chunks(columns) {
            let mut row = chunk.to_vec();
            row.resize(columns, String::new());
            builder.push_record(row);
        }

        let mut table = builder.build();
        self.apply_style(&mut table);
        self.titled(table)
    }

    fn render_standard(&self, summaries: &[&StrategySummary]) -> String {
        let rows: Vec<SummaryRow> = summaries.iter().map(|summary| SummaryRow::from(*summary)).collect();

        let mut table = Table::new(&rows);
        self.apply_style(&mut table);

        if !self.config.show_header {
            table.with(tabled::settings::Remove::row(
                tabled::settings::object::Rows::first(),
            ));
        }

        self.titled(table)
    }

    /// Renders the summaries as a table string.
    pub fn render<'a>(&self, summaries: impl IntoIterator<Item = &'a StrategySummary>) -> String {
        let summaries = self.ordered(summaries);
        if self.config.compact {
            self.render_compact(&summaries)
        } else {
            self.render_standard(&summaries)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(strategy: &str, average: Option<f64>) -> StrategySummary {
        StrategySummary {
            strategy: strategy.to_string(),
            average_millis: average,
            min_millis: average,
            max_millis: average,
            successes: u32::from(average.is_some()),
            failures: u32::from(average.is_none()),
        }
    }

    #[test]
    fn test_render_empty() {
        let empty: Vec<StrategySummary> = Vec::new();
        let output = TableObserver::new().render(&empty);
        assert!(output.contains("Strategy"));
    }

    #[test]
    fn test_render_empty_compact() {
        let empty: Vec<StrategySummary> = Vec::new();
        let output = TableObserver::new().compact(true).render(&empty);
        assert!(output.is_empty());
    }

    #[test]
    fn test_fastest_first() {
        let summaries = vec![
            summary("slow", Some(90.0)),
            summary("broken", None),
            summary("fast", Some(10.5)),
        ];
        let output = TableObserver::new().render(&summaries);

        let fast = output.find("fast").unwrap();
        let slow = output.find("slow").unwrap();
        let broken = output.find("broken").unwrap();
        assert!(fast < slow && slow < broken);
        assert!(output.contains("10.5"));
    }

    #[test]
    fn test_unsorted_keeps_run_order() {
        let summaries = vec![summary("slow", Some(90.0)), summary("fast", Some(10.0))];
        let output = TableObserver::new().sorted(false).render(&summaries);
        assert!(output.find("slow").unwrap() < output.find("fast").unwrap());
    }

    #[test]
    fn test_missing_average_shows_placeholder() {
        let output = TableObserver::new()
            .with_style(TableStyle::Ascii)
            .render(&[summary("broken", None)]);
        let row = output.lines().find(|line| line.contains("broken")).unwrap();
        assert!(row.contains(MISSING));
    }

    #[test]
    fn test_without_header() {
        let output = TableObserver::new()
            .with_header(false)
            .render(&[summary("latch", Some(1.0))]);
        assert!(!output.contains("Average (ms)"));
        assert!(output.contains("latch"));
    }

    #[test]
    fn test_compact_grid() {
        let summaries = vec![
            summary("a", Some(1.0)),
            summary("b", Some(2.0)),
            summary("c", Some(3.0)),
        ];
        let output = TableObserver::new()
            .compact(true)
            .columns(2)
            .separator(CompactSeparator::Equals)
            .render(&summaries);

        assert!(output.contains("a = 1.0"));
        assert!(output.contains("c = 3.0"));
    }

    #[test]
    fn test_every_separator_renders() {
        let summaries = vec![summary("latch", Some(2.5))];
        for (separator, expected) in [
            (CompactSeparator::Colon, "latch: 2.5"),
            (CompactSeparator::Equals, "latch = 2.5"),
            (CompactSeparator::Arrow, "latch → 2.5"),
            (CompactSeparator::Pipe, "latch | 2.5"),
        ] {
            let output = TableObserver::new()
                .compact(true)
                .separator(separator)
                .render(&summaries);
            assert!(output.contains(expected), "{separator:?}: {output}");
        }
    }
}
