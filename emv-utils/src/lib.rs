//! Shared utility functions for EMV crates.

/// Date utility functions
pub mod dates {
    use chrono::{Datelike, NaiveDate};
    use emv_core::error::{EngineError, Result};

    const RUSSIAN_MONTHS: [&str; 12] = [
        "января",
        "февраля",
        "марта",
        "апреля",
        "мая",
        "июня",
        "июля",
        "августа",
        "сентября",
        "октября",
        "ноября",
        "декабря",
    ];

    /// Format a NaiveDate as "YYYY-MM-DD"
    pub fn format_date(date: &NaiveDate) -> String {
        date.format("%Y-%m-%d").to_string()
    }

    /// Parse a date string in "YYYY-MM-DD" format
    pub fn parse_date(s: &str) -> Result<NaiveDate> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map_err(|_| EngineError::MalformedDate(s.to_string()))
    }

    /// Parse a date string in "YYYYMMDD" format
    pub fn parse_date_compact(s: &str) -> Result<NaiveDate> {
        NaiveDate::parse_from_str(s.trim(), "%Y%m%d")
            .map_err(|_| EngineError::MalformedDate(s.to_string()))
    }

    /// Parse ISO, compact or US "MM/DD/YYYY" dates, the formats found in
    /// downloaded statistics tables.
    pub fn parse_any(s: &str) -> Result<NaiveDate> {
        let trimmed = s.trim();
        let date_part = trimmed.split([' ', 'T']).next().unwrap_or(trimmed);
        ["%Y-%m-%d", "%Y%m%d", "%m/%d/%Y"]
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(date_part, format).ok())
            .ok_or_else(|| EngineError::MalformedDate(s.to_string()))
    }

    /// Month number for a Russian month name in the genitive case ("октября").
    pub fn russian_month(name: &str) -> Option<u32> {
        let name = name.trim().to_lowercase();
        RUSSIAN_MONTHS
            .iter()
            .position(|m| *m == name)
            .map(|i| i as u32 + 1)
    }

    /// Assigns years to day-month dates ("15 октября") listed newest first.
    ///
    /// Starts from a reference date, normally today. Each date takes the
    /// current year unless that would place it after the previous row, in
    /// which case the year rolls back by one.
    #[derive(Debug, Clone)]
    pub struct DayMonthDates {
        previous: NaiveDate,
        year: i32,
    }

    impl DayMonthDates {
        pub fn new(reference: NaiveDate) -> Self {
            DayMonthDates {
                previous: reference,
                year: reference.year(),
            }
        }

        pub fn next_date(&mut self, text: &str) -> Result<NaiveDate> {
            let malformed = || EngineError::MalformedDate(text.to_string());
            let mut parts = text.split_whitespace();
            let day: u32 = parts
                .next()
                .and_then(|d| d.parse().ok())
                .ok_or_else(malformed)?;
            let month = parts.next().and_then(russian_month).ok_or_else(malformed)?;

            // rows run newest first: a later (month, day) belongs to the year before
            let year = if (month, day) > (self.previous.month(), self.previous.day()) {
                self.year - 1
            } else {
                self.year
            };
            let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(malformed)?;
            self.year = year;
            self.previous = date;
            Ok(date)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn d(y: i32, m: u32, day: u32) -> NaiveDate {
            NaiveDate::from_ymd_opt(y, m, day).unwrap()
        }

        #[test]
        fn test_parse_formats() {
            assert_eq!(parse_date("2021-10-15").unwrap(), d(2021, 10, 15));
            assert_eq!(parse_date_compact("20211015").unwrap(), d(2021, 10, 15));
            assert_eq!(parse_any("10/15/2021").unwrap(), d(2021, 10, 15));
            assert_eq!(parse_any("2021-10-15T00:00:00").unwrap(), d(2021, 10, 15));
            assert_eq!(parse_any("10/15/2021 12:00:00 AM").unwrap(), d(2021, 10, 15));
            assert_eq!(
                parse_date("15.10.2021"),
                Err(EngineError::MalformedDate("15.10.2021".into()))
            );
        }

        #[test]
        fn test_russian_month() {
            assert_eq!(russian_month("января"), Some(1));
            assert_eq!(russian_month("Декабря"), Some(12));
            assert_eq!(russian_month("бубня"), None);
        }

        #[test]
        fn test_day_month_year_rollback() {
            let mut dates = DayMonthDates::new(d(2022, 1, 10));
            assert_eq!(dates.next_date("9 января").unwrap(), d(2022, 1, 9));
            assert_eq!(dates.next_date("31 декабря").unwrap(), d(2021, 12, 31));
            assert_eq!(dates.next_date("30 декабря").unwrap(), d(2021, 12, 30));
            assert_eq!(dates.next_date("15 октября").unwrap(), d(2021, 10, 15));
            // A whole year without reports still rolls back only once
            assert_eq!(dates.next_date("20 декабря").unwrap(), d(2020, 12, 20));
        }

        #[test]
        fn test_leap_day_rolls_back_into_leap_year() {
            let mut dates = DayMonthDates::new(d(2025, 1, 10));
            assert_eq!(dates.next_date("29 февраля").unwrap(), d(2024, 2, 29));
            assert_eq!(dates.next_date("28 февраля").unwrap(), d(2024, 2, 28));

            let mut dates = DayMonthDates::new(d(2024, 3, 5));
            assert_eq!(dates.next_date("29 февраля").unwrap(), d(2024, 2, 29));

            // no earlier row can be 29 February 2025
            let mut dates = DayMonthDates::new(d(2025, 3, 5));
            assert!(matches!(dates.next_date("29 февраля"), Err(EngineError::MalformedDate(_))));
        }

        #[test]
        fn test_same_date_repeated_keeps_year() {
            let mut dates = DayMonthDates::new(d(2021, 10, 20));
            assert_eq!(dates.next_date("15 октября").unwrap(), d(2021, 10, 15));
            assert_eq!(dates.next_date("15 октября").unwrap(), d(2021, 10, 15));
        }

        #[test]
        fn test_day_month_malformed() {
            let mut dates = DayMonthDates::new(d(2021, 10, 20));
            assert!(matches!(dates.next_date("15 бубня"), Err(EngineError::MalformedDate(_))));
            assert!(dates.next_date("октября").is_err());
            assert!(dates.next_date("32 октября").is_err());
        }
    }
}

/// Number utility functions
pub mod numbers {
    use emv_core::error::{EngineError, Result};

    /// Parse a count printed with thousands separators ("1 234 567").
    ///
    /// Regular and non-breaking spaces are ignored. An empty cell is zero.
    pub fn parse_count(s: &str, row: usize) -> Result<u32> {
        let digits: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '\u{a0}' && *c != '\u{202f}')
            .collect();
        if digits.is_empty() {
            return Ok(0);
        }
        digits.parse().map_err(|_| EngineError::UnparsableRecord {
            row,
            reason: format!("not a count: {s:?}"),
        })
    }

    /// Parse a decimal field. Empty cells are `None`.
    pub fn parse_optional_f64(s: &str, row: usize) -> Result<Option<f64>> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(None);
        }
        s.replace(',', "")
            .parse()
            .map(Some)
            .map_err(|_| EngineError::UnparsableRecord {
                row,
                reason: format!("not a number: {s:?}"),
            })
    }

}
