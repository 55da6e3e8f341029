//! Week-of-month bucketing.
//!
//! Four historical definitions of "week of month" are kept side by side.
//! Their outputs are not comparable with each other, so every [`WeekKey`]
//! travels with the policy that produced it.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::error::TrendError;
use crate::models::{MonthKey, WeekKey};

/// Lowest number of buckets every month gets when zero-filling.
pub const MIN_WEEKS_PER_MONTH: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WeekPolicy {
    /// `((day - 1) / 7) + 1`: blocks of seven days from the 1st.
    #[default]
    DayRange,
    /// Week 1 is the Monday-first week containing the 1st, so it may be short.
    CalendarAligned,
    /// Days 1-7, 8-14, 15-21, 22-28 and 29-31 as explicit ranges.
    ExplicitRange,
    /// Row index in a Monday-first month calendar.
    MonthGrid,
}

impl WeekPolicy {
    pub const ALL: [WeekPolicy; 4] = [
        WeekPolicy::DayRange,
        WeekPolicy::CalendarAligned,
        WeekPolicy::ExplicitRange,
        WeekPolicy::MonthGrid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WeekPolicy::DayRange => "day-range",
            WeekPolicy::CalendarAligned => "calendar-aligned",
            WeekPolicy::ExplicitRange => "explicit-range",
            WeekPolicy::MonthGrid => "month-grid",
        }
    }

    pub fn week_of_month(&self, date: NaiveDate) -> u32 {
        let day = date.day();
        match self {
            WeekPolicy::DayRange => (day - 1) / 7 + 1,
            WeekPolicy::CalendarAligned => {
                (day + first_weekday_offset(date.year(), date.month()) - 1) / 7 + 1
            }
            WeekPolicy::ExplicitRange => match day {
                1..=7 => 1,
                8..=14 => 2,
                15..=21 => 3,
                22..=28 => 4,
                _ => 5,
            },
            WeekPolicy::MonthGrid => month_grid(date.year(), date.month())
                .iter()
                .position(|row| row.contains(&day))
                .map_or(1, |index| index as u32 + 1),
        }
    }

    /// Highest week index any day of `month` maps to.
    pub fn weeks_in_month(&self, month: MonthKey) -> u32 {
        let days = month.days_in_month();
        match NaiveDate::from_ymd_opt(month.year, month.month, days) {
            Some(last_day) => self.week_of_month(last_day),
            None => MIN_WEEKS_PER_MONTH,
        }
    }

    /// Week indices a zero-filled month must carry: `1..=5`, extended to a
    /// sixth calendar row when the policy produces one.
    pub fn bucket_universe(&self, month: MonthKey) -> std::ops::RangeInclusive<u32> {
        1..=self.weeks_in_month(month).max(MIN_WEEKS_PER_MONTH)
    }
}

impl fmt::Display for WeekPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WeekPolicy {
    type Err = TrendError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('_', "-");
        WeekPolicy::ALL
            .into_iter()
            .find(|policy| policy.as_str() == normalized)
            .ok_or_else(|| TrendError::UnknownPolicy(value.to_string()))
    }
}

/// Assign `date` to its bucket under `policy`.
pub fn bucket_date(date: NaiveDate, policy: WeekPolicy) -> WeekKey {
    WeekKey {
        year: date.year(),
        month: date.month(),
        week_of_month: policy.week_of_month(date),
    }
}

/// Monday-first weekday index (0..=6) of the 1st of the month.
fn first_weekday_offset(year: i32, month: u32) -> u32 {
    NaiveDate::from_ymd_opt(year, month, 1)
        .map_or(0, |first| first.weekday().num_days_from_monday())
}

/// Monday-first calendar rows for a month; `0` marks days of other months.
pub fn month_grid(year: i32, month: u32) -> Vec<[u32; 7]> {
    let days = MonthKey { year, month }.days_in_month();
    let mut rows = Vec::new();
    let mut row = [0u32; 7];
    let mut column = first_weekday_offset(year, month) as usize;

    for day in 1..=days {
        row[column] = day;
        column += 1;
        if column == 7 {
            rows.push(row);
            row = [0u32; 7];
            column = 0;
        }
    }
    if column > 0 {
        rows.push(row);
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn every_day(year: i32) -> impl Iterator<Item = NaiveDate> {
        date(year, 1, 1)
            .iter_days()
            .take_while(move |day| day.year() == year)
    }

    #[test]
    fn day_range_and_explicit_range_agree_and_stay_within_five() {
        for year in [2023, 2024, 2025] {
            for day in every_day(year) {
                let a = WeekPolicy::DayRange.week_of_month(day);
                let c = WeekPolicy::ExplicitRange.week_of_month(day);
                assert_eq!(a, c, "{day}");
                assert!((1..=5).contains(&a), "{day}");
                if day.day() >= 29 {
                    assert_eq!(a, 5);
                }
            }
        }
    }

    #[test]
    fn day_range_blocks_start_on_the_first() {
        assert_eq!(WeekPolicy::DayRange.week_of_month(date(2024, 5, 1)), 1);
        assert_eq!(WeekPolicy::DayRange.week_of_month(date(2024, 5, 7)), 1);
        assert_eq!(WeekPolicy::DayRange.week_of_month(date(2024, 5, 8)), 2);
        assert_eq!(WeekPolicy::DayRange.week_of_month(date(2024, 5, 28)), 4);
    }

    #[test]
    fn calendar_aligned_week_one_is_short_when_month_starts_late() {
        // 1 Sep 2024 is a Sunday: week 1 holds a single day.
        let policy = WeekPolicy::CalendarAligned;
        assert_eq!(policy.week_of_month(date(2024, 9, 1)), 1);
        assert_eq!(policy.week_of_month(date(2024, 9, 2)), 2);
        assert_eq!(policy.week_of_month(date(2024, 9, 30)), 6);
        // 1 Jan 2024 is a Monday: aligned weeks match day ranges.
        assert_eq!(policy.week_of_month(date(2024, 1, 7)), 1);
        assert_eq!(policy.week_of_month(date(2024, 1, 8)), 2);
    }

    #[test]
    fn month_grid_matches_calendar_alignment() {
        for year in [2023, 2024] {
            for day in every_day(year) {
                assert_eq!(
                    WeekPolicy::MonthGrid.week_of_month(day),
                    WeekPolicy::CalendarAligned.week_of_month(day),
                    "{day}"
                );
            }
        }
    }

    #[test]
    fn month_grid_rows_cover_every_day_once() {
        let grid = month_grid(2024, 9);
        assert_eq!(grid.len(), 6);
        assert_eq!(grid[0], [0, 0, 0, 0, 0, 0, 1]);
        let days: Vec<u32> = grid.iter().flatten().copied().filter(|d| *d > 0).collect();
        assert_eq!(days, (1..=30).collect::<Vec<_>>());
        // February 2021 starts on a Monday and fills exactly four rows.
        assert_eq!(month_grid(2021, 2).len(), 4);
    }

    #[test]
    fn bucket_universe_never_drops_below_five() {
        let feb_2021 = MonthKey { year: 2021, month: 2 };
        assert_eq!(WeekPolicy::MonthGrid.bucket_universe(feb_2021), 1..=5);
        let sep_2024 = MonthKey { year: 2024, month: 9 };
        assert_eq!(WeekPolicy::CalendarAligned.bucket_universe(sep_2024), 1..=6);
        assert_eq!(WeekPolicy::DayRange.bucket_universe(sep_2024), 1..=5);
    }

    #[test]
    fn bucket_date_builds_key() {
        let key = bucket_date(date(2024, 3, 30), WeekPolicy::DayRange);
        assert_eq!(
            key,
            WeekKey {
                year: 2024,
                month: 3,
                week_of_month: 5
            }
        );
    }

    #[test]
    fn policies_parse_from_cli_names() {
        assert_eq!("month-grid".parse::<WeekPolicy>().unwrap(), WeekPolicy::MonthGrid);
        assert_eq!(
            "Calendar_Aligned".parse::<WeekPolicy>().unwrap(),
            WeekPolicy::CalendarAligned
        );
        assert!(matches!(
            "iso".parse::<WeekPolicy>(),
            Err(TrendError::UnknownPolicy(_))
        ));
    }
}
