//! Error types for the weekly trends library.

use chrono::NaiveDate;

/// Everything the core can refuse to do.
///
/// Growth against a zero baseline is not an error; see
/// [`Growth::Undefined`](crate::models::Growth::Undefined).
#[derive(Debug, thiserror::Error)]
pub enum TrendError {
    #[error("invalid date range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("no data for period {start} to {end}")]
    EmptyRange { start: NaiveDate, end: NaiveDate },

    #[error("unknown metric '{0}'")]
    UnknownMetric(String),

    #[error("week of month must be at least 1, got {0}")]
    InvalidWeek(u32),

    #[error("unknown week-of-month policy '{0}'")]
    UnknownPolicy(String),

    #[error("date column '{0}' not found in header")]
    MissingDateColumn(String),

    #[error("row {row}: invalid date '{value}' (expected DD/MM/YYYY)")]
    InvalidDate { row: usize, value: String },

    #[error("row {row}: invalid value '{value}' for metric '{metric}'")]
    InvalidValue {
        row: usize,
        metric: String,
        value: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl TrendError {
    /// True for the "nothing to show" signal callers render as an empty state.
    pub fn is_empty_range(&self) -> bool {
        matches!(self, TrendError::EmptyRange { .. })
    }
}

pub type TrendResult<T> = Result<T, TrendError>;
