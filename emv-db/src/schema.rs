//! SQL schema definitions for the record cache.
//!
//! Dates are stored as ISO `YYYY-MM-DD` text so that range filters compare
//! lexicographically. Region names are stored raw; normalization happens
//! when the records are joined.

/// Returns the full SQL schema as a single batch string.
///
/// **Vaccination tables:**
/// - `vaccination` - cumulative counts per region and report date
/// - `coverage` - per-jurisdiction coverage counts and percentages, with 65+ cohort columns
///
/// **Mortality tables:**
/// - `monthly_mortality` - deaths per region, year and month
/// - `mortality_comparison` - deaths in a target month and the same month a year earlier
/// - `weekly_deaths` - deaths per jurisdiction, week and age band
///
/// **Reference tables:**
/// - `population` - resident population per region
pub fn create_schema() -> &'static str {
    r#"
    CREATE TABLE IF NOT EXISTS vaccination (
        region TEXT NOT NULL,
        date TEXT NOT NULL,
        vaccinated INTEGER NOT NULL,
        fully_vaccinated INTEGER NOT NULL,
        revaccinated INTEGER NOT NULL,
        PRIMARY KEY (region, date)
    );
    CREATE INDEX IF NOT EXISTS idx_vaccination_region ON vaccination(region);

    CREATE TABLE IF NOT EXISTS coverage (
        jurisdiction TEXT NOT NULL,
        date TEXT NOT NULL,
        first REAL,
        first_pct REAL,
        first_65plus REAL,
        first_65plus_pct REAL,
        second REAL,
        second_pct REAL,
        second_65plus REAL,
        second_65plus_pct REAL,
        PRIMARY KEY (jurisdiction, date)
    );
    CREATE INDEX IF NOT EXISTS idx_coverage_date ON coverage(date);

    CREATE TABLE IF NOT EXISTS monthly_mortality (
        region TEXT NOT NULL,
        year INTEGER NOT NULL,
        month INTEGER NOT NULL,
        deaths REAL NOT NULL,
        PRIMARY KEY (region, year, month)
    );

    CREATE TABLE IF NOT EXISTS mortality_comparison (
        period TEXT NOT NULL,
        region TEXT NOT NULL,
        current REAL NOT NULL,
        previous REAL NOT NULL,
        PRIMARY KEY (period, region)
    );

    CREATE TABLE IF NOT EXISTS weekly_deaths (
        jurisdiction TEXT NOT NULL,
        week_end TEXT NOT NULL,
        age_group TEXT NOT NULL,
        above_65 INTEGER NOT NULL,
        deaths REAL NOT NULL,
        PRIMARY KEY (jurisdiction, week_end, age_group)
    );
    CREATE INDEX IF NOT EXISTS idx_weekly_week_end ON weekly_deaths(week_end);

    CREATE TABLE IF NOT EXISTS population (
        region TEXT PRIMARY KEY,
        population REAL NOT NULL
    );
    "#
}
