use std::fmt::Write;

use crate::aggregate::aggregate;
use crate::bucket::WeekPolicy;
use crate::compare::{chain_table, compare_adjacent, compare_periods, Lag};
use crate::error::TrendResult;
use crate::models::{
    AdjacentDelta, BucketSeries, ChainTable, Dataset, DateRange, Delta, Growth,
    PeriodComparison, SeriesPoint,
};

/// Whole numbers print without decimals; anything else keeps two.
pub fn format_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

/// `N/A` when there was no baseline at all.
pub fn format_growth(growth: Option<Growth>) -> String {
    match growth {
        Some(growth) => growth.to_string(),
        None => "N/A".to_string(),
    }
}

fn format_delta(delta: Option<&Delta>) -> (String, String) {
    let abs = delta.map_or_else(|| "N/A".to_string(), |delta| format_signed(delta.abs));
    (abs, format_growth(delta.map(|delta| delta.pct)))
}

fn format_signed(value: f64) -> String {
    if value > 0.0 {
        format!("+{}", format_value(value))
    } else {
        format_value(value)
    }
}

pub fn render_series(metric: &str, points: &[SeriesPoint]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "| Data | {} |", metric);
    let _ = writeln!(output, "|---|---:|");
    for point in points {
        let _ = writeln!(
            output,
            "| {} | {} |",
            point.date.format("%d/%m/%Y"),
            format_value(point.value)
        );
    }
    output
}

pub fn render_buckets(series: &BucketSeries) -> String {
    let mut output = String::new();
    let _ = write!(output, "| Week | Rows |");
    for metric in &series.metrics {
        let _ = write!(output, " {} |", metric);
    }
    let _ = writeln!(output);
    let _ = write!(output, "|---|---:|");
    for _ in &series.metrics {
        let _ = write!(output, "---:|");
    }
    let _ = writeln!(output);

    for bucket in &series.buckets {
        let _ = write!(output, "| {} | {} |", bucket.key, bucket.record_count);
        for metric in &series.metrics {
            let _ = write!(output, " {} |", format_value(bucket.total(metric).unwrap_or(0.0)));
        }
        let _ = writeln!(output);
    }
    output
}

pub fn render_adjacent(metric: &str, rows: &[AdjacentDelta]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "| Week | Compared with | {} | Previous | Change | Change (%) |", metric);
    let _ = writeln!(output, "|---|---|---:|---:|---:|---:|");
    for row in rows {
        let (abs, pct) = format_delta(row.delta.as_ref());
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} | {} | {} |",
            row.key,
            row.reference
                .map(|key| key.to_string())
                .unwrap_or_else(|| "-".to_string()),
            format_value(row.current),
            row.previous
                .map(format_value)
                .unwrap_or_else(|| "N/A".to_string()),
            abs,
            pct
        );
    }
    output
}

/// One column per metric value, then one `Δ% metric vs month` column per
/// reference month in chronological order.
pub fn render_chain_table(table: &ChainTable) -> String {
    let references = table.reference_columns();
    let mut output = String::new();

    let _ = write!(output, "| Month |");
    for metric in &table.metrics {
        let _ = write!(output, " {} |", metric);
    }
    for reference in &references {
        for metric in &table.metrics {
            let _ = write!(output, " Δ% {} vs {} |", metric, reference);
        }
    }
    let _ = writeln!(output);
    let columns = 1 + table.metrics.len() * (1 + references.len());
    let _ = writeln!(output, "|{}", "---|".repeat(columns));

    for row in &table.rows {
        let _ = write!(output, "| {} |", row.period);
        for metric in &table.metrics {
            let value = row.values.get(metric).copied().unwrap_or(0.0);
            let _ = write!(output, " {} |", format_value(value));
        }
        for reference in &references {
            for metric in &table.metrics {
                let cell = row
                    .delta(metric, *reference)
                    .map(|delta| delta.pct.to_string())
                    .unwrap_or_default();
                let _ = write!(output, " {} |", cell);
            }
        }
        let _ = writeln!(output);
    }
    output
}

pub fn render_periods(comparison: &PeriodComparison) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "| Metric | Period 1 ({}) | Period 2 ({}) | Change | Change (%) |",
        comparison.first, comparison.second
    );
    let _ = writeln!(output, "|---|---:|---:|---:|---:|");
    for row in &comparison.rows {
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} | {} |",
            row.metric,
            format_value(row.first_total),
            format_value(row.second_total),
            format_signed(row.delta.abs),
            row.delta.pct
        );
    }
    output
}

/// Markdown report for one metric: trend, buckets, week-over-week,
/// month-over-month and the same-week chains.
pub fn build_report(
    dataset: &Dataset,
    metric: &str,
    range: DateRange,
    policy: WeekPolicy,
    compare_with: Option<DateRange>,
) -> TrendResult<String> {
    dataset.require_metric(metric)?;
    let series = aggregate(dataset, range, policy, true)?;
    let points: Vec<SeriesPoint> = dataset
        .series(metric)?
        .into_iter()
        .filter(|point| range.contains(point.date))
        .collect();

    let mut output = String::new();
    let _ = writeln!(output, "# Weekly Trends Report");
    let _ = writeln!(
        output,
        "Generated for {} from {} (week of month: {})",
        metric, range, policy
    );
    let _ = writeln!(output);

    let _ = writeln!(output, "## Trend");
    let _ = write!(output, "{}", render_series(metric, &points));
    let _ = writeln!(output);

    let _ = writeln!(output, "## Weekly Buckets");
    let _ = write!(output, "{}", render_buckets(&series));
    let _ = writeln!(output);

    let _ = writeln!(output, "## Week over Week");
    let week_over_week = compare_adjacent(&series, metric, Lag::PreviousBucket)?;
    let _ = write!(output, "{}", render_adjacent(metric, &week_over_week));
    let _ = writeln!(output);

    let _ = writeln!(output, "## Month over Month (same week)");
    let month_over_month = compare_adjacent(&series, metric, Lag::SameWeekPreviousMonth)?;
    let _ = write!(output, "{}", render_adjacent(metric, &month_over_month));

    let last_week = series
        .buckets
        .iter()
        .map(|bucket| bucket.key.week_of_month)
        .max()
        .unwrap_or(0);
    for week_of_month in 1..=last_week {
        let table = chain_table(&series, &[metric], week_of_month)?;
        if table.rows.len() < 2 {
            continue;
        }
        let _ = writeln!(output);
        let _ = writeln!(output, "## Week {} Across Months", week_of_month);
        let _ = write!(output, "{}", render_chain_table(&table));
    }

    if let Some(other) = compare_with {
        match compare_periods(dataset, range, other) {
            Ok(comparison) => {
                let _ = writeln!(output);
                let _ = writeln!(output, "## Period Comparison");
                let _ = write!(output, "{}", render_periods(&comparison));
            }
            Err(err) if err.is_empty_range() => {
                let _ = writeln!(output);
                let _ = writeln!(output, "## Period Comparison");
                let _ = writeln!(output, "No data for {}.", other);
            }
            Err(err) => return Err(err),
        }
    }

    Ok(output)
}
