use chrono::{NaiveDate, TimeDelta};
use std::mem::replace;

/// An inclusive calendar-day interval `[start, end]`.
///
/// Iterating yields each date from the start through the end. An interval
/// whose end precedes its start is empty.
#[derive(Clone, Eq, PartialEq, Copy, Debug)]
pub struct DateRange(pub NaiveDate, pub NaiveDate);

impl DateRange {
    /// Number of calendar days covered, zero when empty.
    pub fn num_days(&self) -> i64 {
        ((self.1 - self.0).num_days() + 1).max(0)
    }

    pub fn is_empty(&self) -> bool {
        self.1 < self.0
    }

    /// The intersection of two intervals, possibly empty.
    pub fn intersect(&self, other: &DateRange) -> DateRange {
        DateRange(self.0.max(other.0), self.1.min(other.1))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.0 <= date && date <= self.1
    }
}

impl Iterator for DateRange {
    type Item = NaiveDate;
    fn next(&mut self) -> Option<Self::Item> {
        if self.0 <= self.1 {
            let next = self.0 + TimeDelta::days(1);
            Some(replace(&mut self.0, next))
        } else {
            None
        }
    }
}
