use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::bucket::WeekPolicy;
use crate::error::{TrendError, TrendResult};

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// One dated row of the source table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub date: NaiveDate,
    pub metrics: BTreeMap<String, f64>,
}

impl Record {
    /// Value of `metric` on this date; a blank cell reads as zero.
    pub fn value(&self, metric: &str) -> f64 {
        self.metrics.get(metric).copied().unwrap_or(0.0)
    }
}

/// The parsed source: metric names in column order and records sorted by date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    metrics: Vec<String>,
    records: Vec<Record>,
}

impl Dataset {
    pub fn new(metrics: Vec<String>, mut records: Vec<Record>) -> Self {
        records.sort_by_key(|record| record.date);
        Self { metrics, records }
    }

    pub fn metrics(&self) -> &[String] {
        &self.metrics
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn has_metric(&self, metric: &str) -> bool {
        self.metrics.iter().any(|name| name == metric)
    }

    pub fn require_metric(&self, metric: &str) -> TrendResult<()> {
        if self.has_metric(metric) {
            Ok(())
        } else {
            Err(TrendError::UnknownMetric(metric.to_string()))
        }
    }

    /// Earliest to latest date, or `None` for an empty table.
    pub fn full_range(&self) -> Option<DateRange> {
        let first = self.records.first()?.date;
        let last = self.records.last()?.date;
        Some(DateRange { start: first, end: last })
    }

    /// Records whose date falls inside `range`, in date order.
    pub fn filter(&self, range: DateRange) -> TrendResult<&[Record]> {
        let lower = self.records.partition_point(|record| record.date < range.start);
        let upper = self.records.partition_point(|record| record.date <= range.end);
        if lower >= upper {
            return Err(TrendError::EmptyRange {
                start: range.start,
                end: range.end,
            });
        }
        Ok(&self.records[lower..upper])
    }

    /// The per-date line of one metric.
    pub fn series(&self, metric: &str) -> TrendResult<Vec<SeriesPoint>> {
        self.require_metric(metric)?;
        Ok(self
            .records
            .iter()
            .map(|record| SeriesPoint {
                date: record.date,
                value: record.value(metric),
            })
            .collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Inclusive `[start, end]` window. Construction rejects `start > end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> TrendResult<Self> {
        if start > end {
            return Err(TrendError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start.format("%d/%m/%Y"),
            self.end.format("%d/%m/%Y")
        )
    }
}

/// Calendar month, ordered by `(year, month)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    /// Number of days in the month; 0 for an impossible month.
    pub fn days_in_month(&self) -> u32 {
        let next = if self.month == 12 {
            NaiveDate::from_ymd_opt(self.year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(self.year, self.month + 1, 1)
        };
        match (self.first_day(), next) {
            (Some(first), Some(next)) => (next - first).num_days() as u32,
            _ => 0,
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match MONTH_ABBREVIATIONS.get(self.month.wrapping_sub(1) as usize) {
            Some(name) => write!(f, "{} {}", name, self.year),
            None => write!(f, "{:02}/{}", self.month, self.year),
        }
    }
}

/// `(year, month, week_of_month)`; only meaningful for the policy that made it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct WeekKey {
    pub year: i32,
    pub month: u32,
    pub week_of_month: u32,
}

impl WeekKey {
    pub fn month_key(&self) -> MonthKey {
        MonthKey {
            year: self.year,
            month: self.month,
        }
    }
}

impl fmt::Display for WeekKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} W{}", self.month_key(), self.week_of_month)
    }
}

/// Sums of every metric over the records mapped to one [`WeekKey`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket {
    pub key: WeekKey,
    pub record_count: usize,
    pub totals: BTreeMap<String, f64>,
}

impl Bucket {
    pub fn total(&self, metric: &str) -> Option<f64> {
        self.totals.get(metric).copied()
    }
}

/// Aggregator output: buckets sorted by key, tagged with the policy used.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketSeries {
    pub policy: WeekPolicy,
    pub range: DateRange,
    pub metrics: Vec<String>,
    pub buckets: Vec<Bucket>,
}

impl BucketSeries {
    pub fn require_metric(&self, metric: &str) -> TrendResult<()> {
        if self.metrics.iter().any(|name| name == metric) {
            Ok(())
        } else {
            Err(TrendError::UnknownMetric(metric.to_string()))
        }
    }

    pub fn get(&self, key: &WeekKey) -> Option<&Bucket> {
        self.buckets
            .binary_search_by(|bucket| bucket.key.cmp(key))
            .ok()
            .map(|index| &self.buckets[index])
    }

    pub fn record_count(&self) -> usize {
        self.buckets.iter().map(|bucket| bucket.record_count).sum()
    }

    /// Buckets holding `week_of_month`, in chronological order.
    pub fn week(&self, week_of_month: u32) -> impl Iterator<Item = &Bucket> {
        self.buckets
            .iter()
            .filter(move |bucket| bucket.key.week_of_month == week_of_month)
    }
}

/// Percentage change, or growth from a zero baseline that has no finite value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Growth {
    Percent(f64),
    Undefined,
}

impl Growth {
    /// Total order: finite percentages ascending, then `Undefined` above them all.
    pub fn total_cmp(&self, other: &Growth) -> Ordering {
        match (self, other) {
            (Growth::Percent(a), Growth::Percent(b)) => a.total_cmp(b),
            (Growth::Percent(_), Growth::Undefined) => Ordering::Less,
            (Growth::Undefined, Growth::Percent(_)) => Ordering::Greater,
            (Growth::Undefined, Growth::Undefined) => Ordering::Equal,
        }
    }
}

impl fmt::Display for Growth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Growth::Percent(value) => write!(f, "{:.2}%", value),
            Growth::Undefined => write!(f, "∞"),
        }
    }
}

/// Absolute and relative change from a baseline to a current value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Delta {
    pub abs: f64,
    pub pct: Growth,
}

/// Mode 1 result for one bucket. `delta` is `None` when no baseline exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdjacentDelta {
    pub key: WeekKey,
    pub reference: Option<WeekKey>,
    pub current: f64,
    pub previous: Option<f64>,
    pub delta: Option<Delta>,
}

/// One cell of a historical chain: the current bucket against an earlier one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainEntry {
    pub reference: WeekKey,
    pub reference_value: f64,
    pub delta: Delta,
}

/// Mode 2 result for one bucket; entries are ordered oldest reference first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainRow {
    pub key: WeekKey,
    pub value: f64,
    pub entries: Vec<ChainEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainCell {
    pub metric: String,
    pub reference: MonthKey,
    pub delta: Delta,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainTableRow {
    pub period: MonthKey,
    pub values: BTreeMap<String, f64>,
    pub cells: Vec<ChainCell>,
}

impl ChainTableRow {
    pub fn delta(&self, metric: &str, reference: MonthKey) -> Option<&Delta> {
        self.cells
            .iter()
            .find(|cell| cell.metric == metric && cell.reference == reference)
            .map(|cell| &cell.delta)
    }
}

/// Several metrics' historical chains for one week of month, keyed by
/// `(metric, reference month)` instead of generated column names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainTable {
    pub week_of_month: u32,
    pub metrics: Vec<String>,
    pub rows: Vec<ChainTableRow>,
}

impl ChainTable {
    /// Every month used as a reference, oldest first.
    pub fn reference_columns(&self) -> Vec<MonthKey> {
        let mut months: Vec<MonthKey> = self
            .rows
            .iter()
            .flat_map(|row| row.cells.iter().map(|cell| cell.reference))
            .collect();
        months.sort();
        months.dedup();
        months
    }
}

/// Totals of one metric over two ranges.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodDelta {
    pub metric: String,
    pub first_total: f64,
    pub second_total: f64,
    pub delta: Delta,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodComparison {
    pub first: DateRange,
    pub second: DateRange,
    pub rows: Vec<PeriodDelta>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(d: NaiveDate, value: f64) -> Record {
        Record {
            date: d,
            metrics: BTreeMap::from([("Abertos".to_string(), value)]),
        }
    }

    #[test]
    fn date_range_rejects_reversed_bounds() {
        let err = DateRange::new(date(2024, 3, 2), date(2024, 3, 1)).unwrap_err();
        assert!(matches!(err, TrendError::InvalidRange { .. }));
        assert!(DateRange::new(date(2024, 3, 1), date(2024, 3, 1)).is_ok());
    }

    #[test]
    fn dataset_sorts_and_filters_inclusively() {
        let dataset = Dataset::new(
            vec!["Abertos".to_string()],
            vec![
                record(date(2024, 1, 15), 3.0),
                record(date(2024, 1, 1), 1.0),
                record(date(2024, 1, 8), 2.0),
            ],
        );
        assert_eq!(dataset.records()[0].date, date(2024, 1, 1));

        let range = DateRange::new(date(2024, 1, 1), date(2024, 1, 8)).unwrap();
        let slice = dataset.filter(range).unwrap();
        assert_eq!(slice.len(), 2);

        let empty = DateRange::new(date(2024, 2, 1), date(2024, 2, 28)).unwrap();
        assert!(dataset.filter(empty).unwrap_err().is_empty_range());
    }

    #[test]
    fn series_requires_known_metric() {
        let dataset = Dataset::new(vec!["Abertos".to_string()], vec![record(date(2024, 1, 1), 4.0)]);
        assert_eq!(dataset.series("Abertos").unwrap()[0].value, 4.0);
        assert!(matches!(
            dataset.series("Fechados"),
            Err(TrendError::UnknownMetric(name)) if name == "Fechados"
        ));
    }

    #[test]
    fn month_keys_order_chronologically_not_by_label() {
        let feb_2025 = MonthKey { year: 2025, month: 2 };
        let jan_2024 = MonthKey { year: 2024, month: 1 };
        let dec_2024 = MonthKey { year: 2024, month: 12 };
        let mut months = vec![feb_2025, dec_2024, jan_2024];
        months.sort();
        assert_eq!(months, vec![jan_2024, dec_2024, feb_2025]);
        assert_eq!(jan_2024.to_string(), "Jan 2024");
        assert_eq!(jan_2024.previous(), MonthKey { year: 2023, month: 12 });
        assert_eq!(MonthKey { year: 2024, month: 2 }.days_in_month(), 29);
    }

    #[test]
    fn undefined_growth_sorts_above_every_percentage() {
        let mut values = vec![Growth::Undefined, Growth::Percent(12.5), Growth::Percent(-40.0)];
        values.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(
            values,
            vec![Growth::Percent(-40.0), Growth::Percent(12.5), Growth::Undefined]
        );
    }
}
