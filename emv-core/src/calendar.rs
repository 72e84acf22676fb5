//! Business-day calendar used to measure elapsed reporting time.
//!
//! Vaccination counts are only updated on working days, so the slope between
//! two samples is expressed per business day rather than per calendar day.

use crate::date_range::DateRange;
use chrono::{Datelike, NaiveDate, TimeDelta, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const ALL_WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// A weekmask plus an optional set of holidays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessCalendar {
    pub workdays: Vec<Weekday>,
    pub holidays: BTreeSet<NaiveDate>,
}

impl Default for BusinessCalendar {
    /// Monday through Friday, no holidays.
    fn default() -> Self {
        BusinessCalendar {
            workdays: ALL_WEEKDAYS[..5].to_vec(),
            holidays: BTreeSet::new(),
        }
    }
}

impl BusinessCalendar {
    pub fn is_business_day(&self, date: NaiveDate) -> bool {
        self.workdays.contains(&date.weekday()) && !self.holidays.contains(&date)
    }

    fn workdays_per_week(&self) -> i64 {
        ALL_WEEKDAYS
            .iter()
            .filter(|day| self.workdays.contains(day))
            .count() as i64
    }

    /// Count business days in the half-open interval `[begin, end)`.
    ///
    /// When `end` precedes `begin` the count covers `[end, begin)` and is
    /// returned negated, so `busday_count(a, b) == -busday_count(b, a)`.
    pub fn busday_count(&self, begin: NaiveDate, end: NaiveDate) -> i64 {
        if end < begin {
            return -self.busday_count(end, begin);
        }
        let days = (end - begin).num_days();
        let weeks = days / 7;
        let mut count = weeks * self.workdays_per_week();

        let tail_start = begin + TimeDelta::days(weeks * 7);
        let tail = DateRange(tail_start, end - TimeDelta::days(1));
        count += tail
            .filter(|date| self.workdays.contains(&date.weekday()))
            .count() as i64;

        let holidays = self
            .holidays
            .range(begin..end)
            .filter(|date| self.workdays.contains(&date.weekday()))
            .count() as i64;
        count - holidays
    }
}
