//! Period-over-period comparisons over aggregated buckets.
//!
//! A missing baseline (no earlier bucket) is `None` and is never folded into
//! zero. A zero baseline with a non-zero current value is
//! [`Growth::Undefined`].

use std::collections::BTreeMap;

use clap::ValueEnum;
use serde::Serialize;

use crate::error::{TrendError, TrendResult};
use crate::models::{
    AdjacentDelta, Bucket, BucketSeries, ChainCell, ChainEntry, ChainRow, ChainTable,
    ChainTableRow, Dataset, DateRange, Delta, Growth, PeriodComparison, PeriodDelta, Record,
    WeekKey,
};

/// Which earlier bucket a single-lag comparison looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Lag {
    /// The bucket right before it in the sorted series (week over week).
    #[default]
    PreviousBucket,
    /// Same week of month in the calendar month before (month over month).
    SameWeekPreviousMonth,
}

pub fn percent_change(previous: f64, current: f64) -> Growth {
    if previous != 0.0 {
        Growth::Percent((current - previous) / previous * 100.0)
    } else if current == 0.0 {
        Growth::Percent(0.0)
    } else {
        Growth::Undefined
    }
}

pub fn delta(previous: f64, current: f64) -> Delta {
    Delta {
        abs: current - previous,
        pct: percent_change(previous, current),
    }
}

fn metric_total(bucket: &Bucket, metric: &str) -> f64 {
    bucket.total(metric).unwrap_or(0.0)
}

/// Mode 1: compare each bucket with one earlier bucket chosen by `lag`.
pub fn compare_adjacent(
    series: &BucketSeries,
    metric: &str,
    lag: Lag,
) -> TrendResult<Vec<AdjacentDelta>> {
    series.require_metric(metric)?;

    let rows = series
        .buckets
        .iter()
        .enumerate()
        .map(|(index, bucket)| {
            let reference = match lag {
                Lag::PreviousBucket => index
                    .checked_sub(1)
                    .and_then(|previous| series.buckets.get(previous)),
                Lag::SameWeekPreviousMonth => {
                    let month = bucket.key.month_key().previous();
                    series.get(&WeekKey {
                        year: month.year,
                        month: month.month,
                        week_of_month: bucket.key.week_of_month,
                    })
                }
            };

            let current = metric_total(bucket, metric);
            let previous = reference.map(|earlier| metric_total(earlier, metric));
            AdjacentDelta {
                key: bucket.key,
                reference: reference.map(|earlier| earlier.key),
                current,
                previous,
                delta: previous.map(|base| delta(base, current)),
            }
        })
        .collect();

    Ok(rows)
}

/// Mode 2: for one week of month, compare every bucket against every
/// strictly earlier bucket with that week, oldest reference first.
pub fn compare_historical_chain(
    series: &BucketSeries,
    metric: &str,
    week_of_month: u32,
) -> TrendResult<Vec<ChainRow>> {
    series.require_metric(metric)?;
    if week_of_month == 0 {
        return Err(TrendError::InvalidWeek(week_of_month));
    }

    let group: Vec<&Bucket> = series.week(week_of_month).collect();
    let rows = group
        .iter()
        .enumerate()
        .map(|(index, bucket)| {
            let value = metric_total(bucket, metric);
            let entries = group[..index]
                .iter()
                .map(|earlier| {
                    let reference_value = metric_total(earlier, metric);
                    ChainEntry {
                        reference: earlier.key,
                        reference_value,
                        delta: delta(reference_value, value),
                    }
                })
                .collect();
            ChainRow {
                key: bucket.key,
                value,
                entries,
            }
        })
        .collect();

    Ok(rows)
}

/// Historical chains of several metrics for one week of month, one row per month.
pub fn chain_table<S: AsRef<str>>(
    series: &BucketSeries,
    metrics: &[S],
    week_of_month: u32,
) -> TrendResult<ChainTable> {
    let mut chains = Vec::with_capacity(metrics.len());
    for metric in metrics {
        let metric = metric.as_ref();
        chains.push((metric, compare_historical_chain(series, metric, week_of_month)?));
    }

    let rows = series
        .week(week_of_month)
        .enumerate()
        .map(|(index, bucket)| {
            let values: BTreeMap<String, f64> = chains
                .iter()
                .map(|(metric, rows)| (metric.to_string(), rows[index].value))
                .collect();

            let mut cells: Vec<ChainCell> = chains
                .iter()
                .flat_map(|(metric, rows)| {
                    rows[index].entries.iter().map(move |entry| ChainCell {
                        metric: metric.to_string(),
                        reference: entry.reference.month_key(),
                        delta: entry.delta,
                    })
                })
                .collect();
            // Stable sort keeps the caller's metric order within a reference month.
            cells.sort_by_key(|cell| cell.reference);

            ChainTableRow {
                period: bucket.key.month_key(),
                values,
                cells,
            }
        })
        .collect();

    Ok(ChainTable {
        week_of_month,
        metrics: metrics.iter().map(|m| m.as_ref().to_string()).collect(),
        rows,
    })
}

/// Totals of every metric over two ranges and the change from the first to the second.
pub fn compare_periods(
    dataset: &Dataset,
    first: DateRange,
    second: DateRange,
) -> TrendResult<PeriodComparison> {
    let first_records = dataset.filter(first)?;
    let second_records = dataset.filter(second)?;

    let rows = dataset
        .metrics()
        .iter()
        .map(|metric| {
            let first_total = sum(first_records, metric);
            let second_total = sum(second_records, metric);
            PeriodDelta {
                metric: metric.clone(),
                first_total,
                second_total,
                delta: delta(first_total, second_total),
            }
        })
        .collect();

    Ok(PeriodComparison {
        first,
        second,
        rows,
    })
}

fn sum(records: &[Record], metric: &str) -> f64 {
    records.iter().map(|record| record.value(metric)).sum()
}
