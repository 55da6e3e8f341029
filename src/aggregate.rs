use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::bucket::{bucket_date, WeekPolicy};
use crate::error::TrendResult;
use crate::models::{Bucket, BucketSeries, Dataset, DateRange, MonthKey, Record, WeekKey};

/// Group records in `range` by week of month and sum every metric.
///
/// With `zero_fill`, each month that has at least one record in range also
/// gets empty buckets for the rest of its bucket universe, so every month
/// exposes weeks 1 through 5 (or 6 where the policy yields a sixth row).
pub fn aggregate(
    dataset: &Dataset,
    range: DateRange,
    policy: WeekPolicy,
    zero_fill: bool,
) -> TrendResult<BucketSeries> {
    let records = dataset.filter(range)?;
    let metrics = dataset.metrics().to_vec();
    let mut grouped: BTreeMap<WeekKey, Bucket> = BTreeMap::new();

    for record in records {
        let key = bucket_date(record.date, policy);
        let bucket = grouped
            .entry(key)
            .or_insert_with(|| empty_bucket(key, &metrics));
        add_record(bucket, record, &metrics);
    }

    let observed = grouped.len();
    if zero_fill {
        let months: BTreeSet<MonthKey> = grouped.keys().map(WeekKey::month_key).collect();
        for month in months {
            for week_of_month in policy.bucket_universe(month) {
                let key = WeekKey {
                    year: month.year,
                    month: month.month,
                    week_of_month,
                };
                grouped
                    .entry(key)
                    .or_insert_with(|| empty_bucket(key, &metrics));
            }
        }
    }

    debug!(
        policy = %policy,
        records = records.len(),
        observed_buckets = observed,
        buckets = grouped.len(),
        zero_fill,
        "aggregated records into week buckets"
    );

    Ok(BucketSeries {
        policy,
        range,
        metrics,
        buckets: grouped.into_values().collect(),
    })
}

fn empty_bucket(key: WeekKey, metrics: &[String]) -> Bucket {
    Bucket {
        key,
        record_count: 0,
        totals: metrics.iter().map(|metric| (metric.clone(), 0.0)).collect(),
    }
}

fn add_record(bucket: &mut Bucket, record: &Record, metrics: &[String]) {
    bucket.record_count += 1;
    for metric in metrics {
        *bucket.totals.entry(metric.clone()).or_insert(0.0) += record.value(metric);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrendError;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dataset(rows: &[(NaiveDate, f64, f64)]) -> Dataset {
        let records = rows
            .iter()
            .map(|(d, open, closed)| Record {
                date: *d,
                metrics: BTreeMap::from([
                    ("Abertos".to_string(), *open),
                    ("Fechados".to_string(), *closed),
                ]),
            })
            .collect();
        Dataset::new(vec!["Abertos".to_string(), "Fechados".to_string()], records)
    }

    fn sample() -> Dataset {
        dataset(&[
            (date(2024, 1, 2), 10.0, 1.0),
            (date(2024, 1, 5), 5.0, 2.0),
            (date(2024, 1, 16), 7.0, 0.0),
            (date(2024, 1, 30), 3.0, 3.0),
            (date(2024, 2, 6), 8.0, 4.0),
            (date(2024, 2, 13), 2.0, 1.0),
        ])
    }

    fn full(dataset: &Dataset) -> DateRange {
        dataset.full_range().unwrap()
    }

    #[test]
    fn sums_metrics_within_each_bucket() {
        let data = sample();
        let series = aggregate(&data, full(&data), WeekPolicy::DayRange, false).unwrap();
        let keys: Vec<String> = series.buckets.iter().map(|b| b.key.to_string()).collect();
        assert_eq!(
            keys,
            vec!["Jan 2024 W1", "Jan 2024 W3", "Jan 2024 W5", "Feb 2024 W1", "Feb 2024 W2"]
        );
        assert_eq!(series.buckets[0].total("Abertos"), Some(15.0));
        assert_eq!(series.buckets[0].total("Fechados"), Some(3.0));
        assert_eq!(series.buckets[0].record_count, 2);
    }

    #[test]
    fn every_record_lands_in_exactly_one_bucket() {
        let data = sample();
        for policy in WeekPolicy::ALL {
            for zero_fill in [false, true] {
                let series = aggregate(&data, full(&data), policy, zero_fill).unwrap();
                assert_eq!(series.record_count(), data.records().len(), "{policy}");
                let total: f64 = series.buckets.iter().filter_map(|b| b.total("Abertos")).sum();
                assert_eq!(total, 35.0, "{policy}");
            }
        }
    }

    #[test]
    fn zero_fill_completes_weeks_one_to_five_per_month() {
        let data = sample();
        let series = aggregate(&data, full(&data), WeekPolicy::DayRange, true).unwrap();
        assert_eq!(series.buckets.len(), 10);
        let missing = series
            .get(&WeekKey {
                year: 2024,
                month: 1,
                week_of_month: 2,
            })
            .unwrap();
        assert_eq!(missing.record_count, 0);
        assert_eq!(missing.total("Abertos"), Some(0.0));
        assert_eq!(missing.total("Fechados"), Some(0.0));

        let again = aggregate(&data, full(&data), WeekPolicy::DayRange, true).unwrap();
        assert_eq!(series, again);
    }

    #[test]
    fn zero_fill_only_covers_months_with_data() {
        let data = dataset(&[(date(2024, 1, 3), 1.0, 0.0), (date(2024, 3, 3), 1.0, 0.0)]);
        let series = aggregate(&data, full(&data), WeekPolicy::DayRange, true).unwrap();
        assert!(series.buckets.iter().all(|b| b.key.month != 2));
        assert_eq!(series.buckets.len(), 10);
    }

    #[test]
    fn zero_fill_adds_sixth_calendar_row_when_policy_has_one() {
        // September 2024 spans six Monday-first rows.
        let data = dataset(&[(date(2024, 9, 10), 4.0, 0.0)]);
        let series = aggregate(&data, full(&data), WeekPolicy::MonthGrid, true).unwrap();
        let weeks: Vec<u32> = series.buckets.iter().map(|b| b.key.week_of_month).collect();
        assert_eq!(weeks, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn range_restricts_input_and_empty_range_is_reported() {
        let data = sample();
        let february = DateRange::new(date(2024, 2, 1), date(2024, 2, 29)).unwrap();
        let series = aggregate(&data, february, WeekPolicy::DayRange, false).unwrap();
        assert_eq!(series.record_count(), 2);

        let march = DateRange::new(date(2024, 3, 1), date(2024, 3, 31)).unwrap();
        let err = aggregate(&data, march, WeekPolicy::DayRange, true).unwrap_err();
        assert!(matches!(err, TrendError::EmptyRange { .. }));
    }
}
