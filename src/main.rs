//! Command-line driver for the prime-counting benchmark.
//!
//! ```bash
//! # 8 ranges over [1, 1000000], 5 rounds, every strategy
//! primebench 8 1000000 5 all
//!
//! # two strategies, JSON summary, average over configured rounds
//! primebench 16 2000000 3 latch fork-join --format json --pretty --average-over configured
//! ```
//!
//! Per-round lines and the final summary go to stdout. Count mismatches and
//! other diagnostics go to stderr; set `RUST_LOG` to change the `tracing`
//! filter.

use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use primebench::config::BenchmarkConfig;
use primebench::error::{BenchError, Result};
use primebench::harness::{BenchmarkReport, Harness, RoundReport};
use primebench::observers::json::JsonObserver;
use primebench::observers::table::{CompactSeparator, TableObserver, TableStyle};
use primebench::stats::AveragingPolicy;
use primebench::strategies::StrategyKind;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Output format of the final summary.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Table with one row per strategy
    Table,
    /// Grid of `strategy: average` cells
    Compact,
    /// JSON document
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum StyleChoice {
    Ascii,
    #[default]
    Rounded,
    Sharp,
    Modern,
    Markdown,
    Dots,
    Blank,
}

impl From<StyleChoice> for TableStyle {
    fn from(choice: StyleChoice) -> Self {
        match choice {
            StyleChoice::Ascii => TableStyle::Ascii,
            StyleChoice::Rounded => TableStyle::Rounded,
            StyleChoice::Sharp => TableStyle::Sharp,
            StyleChoice::Modern => TableStyle::Modern,
            StyleChoice::Markdown => TableStyle::Markdown,
            StyleChoice::Dots => TableStyle::Dots,
            StyleChoice::Blank => TableStyle::Blank,
        }
    }
}

/// Separator between strategy and average in compact cells.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum SeparatorChoice {
    /// `name: value`
    #[default]
    Colon,
    /// `name = value`
    Equals,
    /// `name → value`
    Arrow,
    /// `name | value`
    Pipe,
}

impl From<SeparatorChoice> for CompactSeparator {
    fn from(choice: SeparatorChoice) -> Self {
        match choice {
            SeparatorChoice::Colon => CompactSeparator::Colon,
            SeparatorChoice::Equals => CompactSeparator::Equals,
            SeparatorChoice::Arrow => CompactSeparator::Arrow,
            SeparatorChoice::Pipe => CompactSeparator::Pipe,
        }
    }
}

/// Divisor used for averages.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum AverageChoice {
    /// Rounds in which the strategy succeeded
    #[default]
    Successful,
    /// The configured number of rounds
    Configured,
}

impl From<AverageChoice> for AveragingPolicy {
    fn from(choice: AverageChoice) -> Self {
        match choice {
            AverageChoice::Successful => AveragingPolicy::SuccessfulRounds,
            AverageChoice::Configured => AveragingPolicy::ConfiguredRounds,
        }
    }
}

/// Compare concurrency strategies on a partitioned prime-counting workload.
#[derive(Parser, Debug)]
#[command(name = "primebench")]
#[command(version, about, long_about = None)]
struct Args {
    /// Number of ranges the domain is split into
    number_of_ranges: usize,

    /// Upper bound of the domain [1, total_range]
    total_range: u64,

    /// Number of rounds
    rounds: u32,

    /// Strategies to run, or `all`
    #[arg(required = true, num_args = 1..)]
    strategies: Vec<String>,

    /// Parallel units for pools and subscriber pairs (default: available cores)
    #[arg(short, long)]
    parallelism: Option<usize>,

    /// Divisor for the final averages
    #[arg(long, value_enum, default_value = "successful")]
    average_over: AverageChoice,

    /// Output format of the summary
    #[arg(short, long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Table style (table/compact formats)
    #[arg(short, long, value_enum, default_value = "rounded")]
    style: StyleChoice,

    /// Number of columns (compact format)
    #[arg(short, long, default_value = "3")]
    columns: usize,

    /// Separator between strategy and average (compact format)
    #[arg(long, value_enum, default_value = "colon")]
    separator: SeparatorChoice,

    /// Hide the header row (table format)
    #[arg(long)]
    no_header: bool,

    /// Keep run order instead of sorting fastest first
    #[arg(long)]
    unsorted: bool,

    /// Pretty print JSON output
    #[arg(long)]
    pretty: bool,

    /// Include timestamp in JSON output
    #[arg(long)]
    timestamp: bool,
}

impl Args {
    fn config(&self) -> Result<BenchmarkConfig> {
        let mut builder = BenchmarkConfig::builder()
            .number_of_ranges(self.number_of_ranges)
            .total_range(self.total_range)
            .rounds(self.rounds)
            .averaging(self.average_over.into());
        if let Some(parallelism) = self.parallelism {
            builder = builder.parallelism(parallelism);
        }
        builder.build()
    }
}

fn print_header(config: &BenchmarkConfig) {
    println!("Counting primes for range 1 to {}", config.total_range);
    println!("Number of ranges: {}", config.number_of_ranges);
    println!("Average range size: {}", config.average_range_size());
    println!("Rounds: {}", config.rounds);
    println!("Parallelism: {}", config.parallelism);
}

fn print_round(report: &RoundReport) {
    println!();
    println!("Round {}", report.round + 1);
    for result in &report.results {
        println!("{result}");
    }
    if let Some(violation) = &report.violation {
        eprintln!("Count mismatch: {violation}");
    }
}

fn render_summary(args: &Args, report: &BenchmarkReport) -> Result<String> {
    match args.format {
        OutputFormat::Table | OutputFormat::Compact => Ok(TableObserver::new()
            .with_style(args.style.into())
            .with_header(!args.no_header)
            .with_title(format!("Average duration ({})", report.averaging))
            .sorted(!args.unsorted)
            .compact(matches!(args.format, OutputFormat::Compact))
            .columns(args.columns)
            .separator(args.separator.into())
            .render(&report.summaries)),
        OutputFormat::Json => JsonObserver::new()
            .pretty(args.pretty)
            .include_timestamp(args.timestamp)
            .sorted(!args.unsorted)
            .to_json(report),
    }
}

fn run(args: &Args) -> Result<()> {
    let strategies = StrategyKind::resolve(&args.strategies)?;
    let config = args.config()?;
    let harness = Harness::from_config(&config)?;

    print_header(&config);
    let report = harness.run_with(&strategies, print_round);

    println!();
    println!("{}", render_summary(args, &report)?);
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,primebench=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err @ BenchError::UnresolvedStrategy { .. }) => {
            error!(%err, "no round was started");
            eprintln!("{err}");
            ExitCode::from(2)
        }
        Err(err) => {
            error!(%err, "benchmark aborted");
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
