//! Typed rows read back from the cache.
//!
//! Region and jurisdiction names are the raw source spellings; callers
//! normalize them before joining.

use chrono::NaiveDate;
use emv_core::period::PeriodBucket;
use emv_core::sample::CoverageRecord;
use serde::Serialize;

/// Deaths registered in one region in one calendar month.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MonthlyMortality {
    pub region: String,
    pub year: i32,
    pub month: u32,
    pub deaths: f64,
}

/// Deaths in a target month next to the same month one year earlier.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MortalityComparison {
    pub region: String,
    pub current: f64,
    pub previous: f64,
}

/// Deaths in one jurisdiction for the week ending on `week_end`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WeeklyDeaths {
    pub jurisdiction: String,
    pub week_end: NaiveDate,
    pub age_group: String,
    pub above_65: bool,
    pub deaths: f64,
}

impl WeeklyDeaths {
    pub fn bucket(&self) -> PeriodBucket {
        PeriodBucket::week_ending(self.week_end, self.deaths)
    }
}

/// Vaccination coverage of one jurisdiction on one date.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct JurisdictionCoverage {
    pub jurisdiction: String,
    pub date: NaiveDate,
    pub record: CoverageRecord,
}
