//! Week-of-month bucketing and period comparison for weekly status tables.
//!
//! Pipeline: [`loader`] parses dated rows, [`bucket`] maps each date to a
//! week of month under a chosen [`WeekPolicy`], [`aggregate`] sums metrics
//! per bucket and [`compare`] derives week-over-week, month-over-month and
//! same-week historical deltas. Every stage is a pure function.

pub mod aggregate;
pub mod bucket;
pub mod compare;
pub mod config;
pub mod error;
pub mod loader;
pub mod models;
pub mod report;

pub use aggregate::aggregate;
pub use bucket::{bucket_date, WeekPolicy};
pub use compare::{
    chain_table, compare_adjacent, compare_historical_chain, compare_periods, percent_change, Lag,
};
pub use error::{TrendError, TrendResult};
pub use loader::{load_csv, parse_csv, DatasetCache};
pub use models::{
    AdjacentDelta, Bucket, BucketSeries, ChainRow, ChainTable, Dataset, DateRange, Delta, Growth,
    MonthKey, Record, WeekKey,
};
