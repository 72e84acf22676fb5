use crate::date_range::DateRange;
use crate::error::{EngineError, Result};
use chrono::{Datelike, NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One reporting row covering `[start, end]` (end inclusive) with a total count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodBucket {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub total: f64,
}

impl PeriodBucket {
    pub fn new(start: NaiveDate, end: NaiveDate, total: f64) -> Result<Self> {
        if end < start {
            return Err(EngineError::InvalidPeriod { start, end });
        }
        Ok(PeriodBucket { start, end, total })
    }

    /// A seven-day bucket ending on `end`.
    pub fn week_ending(end: NaiveDate, total: f64) -> Self {
        PeriodBucket {
            start: end - TimeDelta::days(6),
            end,
            total,
        }
    }

    pub fn as_range(&self) -> DateRange {
        DateRange(self.start, self.end)
    }

    pub fn num_days(&self) -> i64 {
        self.as_range().num_days()
    }

    pub fn overlaps(&self, period: &TargetPeriod) -> bool {
        self.start < period.end && self.end >= period.start
    }
}

/// A target interval `[start, end)` with an exclusive end, typically a calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TargetPeriod {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end <= start {
            return Err(EngineError::InvalidPeriod { start, end });
        }
        Ok(TargetPeriod { start, end })
    }

    /// The calendar month containing `date`.
    pub fn month_of(date: NaiveDate) -> Self {
        let start = first_of_month(date);
        TargetPeriod {
            start,
            end: add_months(start, 1),
        }
    }

    pub fn month(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(TargetPeriod::month_of)
    }

    /// The same period shifted by a whole number of months.
    pub fn shift_months(&self, months: i32) -> Self {
        TargetPeriod {
            start: add_months(self.start, months),
            end: add_months(self.end, months),
        }
    }

    pub fn as_range(&self) -> DateRange {
        DateRange(self.start, self.end - TimeDelta::days(1))
    }

    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

impl fmt::Display for TargetPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let is_month = self.start.day() == 1 && add_months(self.start, 1) == self.end;
        if is_month {
            write!(f, "{}", self.start.format("%Y-%m"))
        } else {
            write!(f, "{}..{}", self.start, self.end)
        }
    }
}

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// First day of the month `months` away from the month containing `date`.
/// Negative values move backwards across year boundaries.
pub fn add_months(date: NaiveDate, months: i32) -> NaiveDate {
    let index = date.year() * 12 + date.month0() as i32 + months;
    let year = index.div_euclid(12);
    let month0 = index.rem_euclid(12) as u32;
    NaiveDate::from_ymd_opt(year, month0 + 1, 1).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_add_months_wraps_years() {
        assert_eq!(add_months(d(2021, 10, 1), 1), d(2021, 11, 1));
        assert_eq!(add_months(d(2021, 12, 1), 1), d(2022, 1, 1));
        assert_eq!(add_months(d(2021, 1, 15), -1), d(2020, 12, 1));
        assert_eq!(add_months(d(2021, 10, 1), -12), d(2020, 10, 1));
        assert_eq!(add_months(d(2021, 3, 31), -14), d(2020, 1, 1));
    }

    #[test]
    fn test_month_period() {
        let october = TargetPeriod::month(2021, 10).unwrap();
        assert_eq!(october.start, d(2021, 10, 1));
        assert_eq!(october.end, d(2021, 11, 1));
        assert_eq!(october.num_days(), 31);
        assert_eq!(october.as_range().num_days(), 31);
        assert_eq!(october.to_string(), "2021-10");
        assert_eq!(october.shift_months(-12).to_string(), "2020-10");
        assert!(TargetPeriod::month(2021, 13).is_none());
    }

    #[test]
    fn test_invalid_periods_are_rejected() {
        assert!(TargetPeriod::new(d(2021, 1, 2), d(2021, 1, 2)).is_err());
        assert!(PeriodBucket::new(d(2021, 1, 2), d(2021, 1, 1), 5.0).is_err());
        assert!(PeriodBucket::new(d(2021, 1, 2), d(2021, 1, 2), 5.0).is_ok());
    }

    #[test]
    fn test_week_bucket_overlap() {
        let week = PeriodBucket::week_ending(d(2021, 2, 2), 70.0);
        assert_eq!(week.start, d(2021, 1, 27));
        assert_eq!(week.num_days(), 7);
        assert!(week.overlaps(&TargetPeriod::month(2021, 1).unwrap()));
        assert!(week.overlaps(&TargetPeriod::month(2021, 2).unwrap()));
        assert!(!week.overlaps(&TargetPeriod::month(2021, 3).unwrap()));
        let custom = TargetPeriod::new(d(2021, 1, 4), d(2021, 1, 11)).unwrap();
        assert_eq!(custom.to_string(), "2021-01-04..2021-01-11");
    }
}
