use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use weekly_trends::config::{Config, OutputFormat};
use weekly_trends::{
    aggregate, chain_table, compare_adjacent, compare_periods, report, Dataset, DatasetCache,
    DateRange, Lag, TrendError, TrendResult,
};

#[derive(Parser)]
#[command(name = "weekly-trends")]
#[command(about = "Week-of-month trends and period comparisons for weekly status tables", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List metrics and the covered date range
    Metrics,
    /// Show one metric date by date
    Trend {
        #[arg(long)]
        metric: String,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// Sum every metric per week of month
    Buckets {
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Emit empty weeks 1-5 for every month with data
        #[arg(long)]
        zero_fill: bool,
    },
    /// Compare each week with one earlier week
    Adjacent {
        #[arg(long)]
        metric: String,
        #[arg(long, value_enum, default_value_t = Lag::PreviousBucket)]
        lag: Lag,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// Compare one week of month against the same week in every earlier month
    Chain {
        #[arg(long = "metric", required = true)]
        metrics: Vec<String>,
        #[arg(long)]
        week: u32,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// Compare metric totals of two date ranges
    Periods {
        #[arg(long)]
        p1_start: NaiveDate,
        #[arg(long)]
        p1_end: NaiveDate,
        #[arg(long)]
        p2_start: NaiveDate,
        #[arg(long)]
        p2_end: NaiveDate,
    },
    /// Generate a markdown report for one metric
    Report {
        #[arg(long)]
        metric: String,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long, requires = "compare_end")]
        compare_start: Option<NaiveDate>,
        #[arg(long, requires = "compare_start")]
        compare_end: Option<NaiveDate>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("weekly_trends=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config;
    config.log_summary();

    let mut cache = DatasetCache::new();
    let dataset = cache
        .load(&config.csv)
        .with_context(|| format!("failed to load {}", config.csv.display()))?;

    match cli.command {
        Commands::Metrics => {
            let range = dataset.full_range();
            match config.format {
                OutputFormat::Json => {
                    #[derive(Serialize)]
                    struct Summary<'a> {
                        metrics: &'a [String],
                        records: usize,
                        range: Option<DateRange>,
                    }
                    print_json(&Summary {
                        metrics: dataset.metrics(),
                        records: dataset.records().len(),
                        range,
                    })?;
                }
                OutputFormat::Text => {
                    match range {
                        Some(range) => println!("{} rows from {}.", dataset.records().len(), range),
                        None => println!("No rows in {}.", config.csv.display()),
                    }
                    for metric in dataset.metrics() {
                        println!("- {metric}");
                    }
                }
            }
        }
        Commands::Trend { metric, start, end } => {
            let range = resolve_range(&dataset, start, end)?;
            let points: Vec<_> = dataset
                .series(&metric)?
                .into_iter()
                .filter(|point| range.contains(point.date))
                .collect();
            if points.is_empty() {
                println!("No data for period {range}.");
                return Ok(());
            }
            match config.format {
                OutputFormat::Json => print_json(&points)?,
                OutputFormat::Text => print!("{}", report::render_series(&metric, &points)),
            }
        }
        Commands::Buckets {
            start,
            end,
            zero_fill,
        } => {
            let range = resolve_range(&dataset, start, end)?;
            let Some(series) = or_no_data(aggregate(&dataset, range, config.policy, zero_fill))?
            else {
                return Ok(());
            };
            match config.format {
                OutputFormat::Json => print_json(&series)?,
                OutputFormat::Text => print!("{}", report::render_buckets(&series)),
            }
        }
        Commands::Adjacent {
            metric,
            lag,
            start,
            end,
        } => {
            let range = resolve_range(&dataset, start, end)?;
            let Some(series) = or_no_data(aggregate(&dataset, range, config.policy, true))? else {
                return Ok(());
            };
            let rows = compare_adjacent(&series, &metric, lag)?;
            match config.format {
                OutputFormat::Json => print_json(&rows)?,
                OutputFormat::Text => print!("{}", report::render_adjacent(&metric, &rows)),
            }
        }
        Commands::Chain {
            metrics,
            week,
            start,
            end,
        } => {
            let range = resolve_range(&dataset, start, end)?;
            let Some(series) = or_no_data(aggregate(&dataset, range, config.policy, true))? else {
                return Ok(());
            };
            let table = chain_table(&series, &metrics, week)?;
            if table.rows.len() < 2 {
                warn!(week, months = table.rows.len(), "not enough months to compare");
            }
            match config.format {
                OutputFormat::Json => print_json(&table)?,
                OutputFormat::Text => print!("{}", report::render_chain_table(&table)),
            }
        }
        Commands::Periods {
            p1_start,
            p1_end,
            p2_start,
            p2_end,
        } => {
            let first = DateRange::new(p1_start, p1_end).context("period 1")?;
            let second = DateRange::new(p2_start, p2_end).context("period 2")?;
            let Some(comparison) = or_no_data(compare_periods(&dataset, first, second))? else {
                return Ok(());
            };
            match config.format {
                OutputFormat::Json => print_json(&comparison)?,
                OutputFormat::Text => print!("{}", report::render_periods(&comparison)),
            }
        }
        Commands::Report {
            metric,
            start,
            end,
            compare_start,
            compare_end,
            out,
        } => {
            let range = resolve_range(&dataset, start, end)?;
            let compare_with = match (compare_start, compare_end) {
                (Some(start), Some(end)) => Some(DateRange::new(start, end)?),
                _ => None,
            };
            let Some(report) = or_no_data(report::build_report(
                &dataset,
                &metric,
                range,
                config.policy,
                compare_with,
            ))?
            else {
                return Ok(());
            };
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

/// Explicit bounds win; missing ones fall back to the dataset's own range.
fn resolve_range(
    dataset: &Dataset,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> anyhow::Result<DateRange> {
    let full = dataset.full_range();
    let start = start
        .or(full.map(|range| range.start()))
        .context("dataset has no rows; pass --start")?;
    let end = end
        .or(full.map(|range| range.end()))
        .context("dataset has no rows; pass --end")?;
    let range = DateRange::new(start, end)?;
    debug!(%range, "resolved date range");
    Ok(range)
}

/// Empty ranges are a normal outcome: say so and stop instead of failing.
fn or_no_data<T>(result: TrendResult<T>) -> anyhow::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(TrendError::EmptyRange { start, end }) => {
            println!(
                "No data for period {} to {}.",
                start.format("%d/%m/%Y"),
                end.format("%d/%m/%Y")
            );
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
