//! CSV data loading functions for populating the cache.
//!
//! Each loader parses CSV data from a string slice and inserts rows into the
//! corresponding table. A malformed row aborts the load with its row number.
//!
//! # CSV Formats
//!
//! - **Vaccination** (has headers): `region,date,vaccinated,fully_vaccinated,revaccinated`
//! - **Region table** (has headers, newest first): `date text,vaccinated,fully vaccinated[,revaccinated]`
//! - **Monthly mortality** (has headers): `year,month,region,deaths`
//! - **Mortality comparison** (`;` separated, has headers): region in column 0,
//!   current deaths in column 5, previous-year deaths in column 6
//! - **Weekly deaths** (has headers): looked up by name, `Week Ending Date`,
//!   `State Abbreviation`, `Age Group`, `Number of Deaths`, `Type`
//! - **Population** (has headers): `region,population`
//! - **Coverage** (has headers): looked up by name, `Date`, `Location` and the
//!   `Administered_Dose1_*` / `Series_Complete_*` count and percentage columns

use crate::Database;
use anyhow::Context;
use chrono::NaiveDate;
use csv::StringRecord;
use emv_core::error::EngineError;
use emv_core::sample::{clear_stale_repeats, Cohort, CoverageRecord, VaccinationRow};
use emv_utils::dates::{format_date, parse_any, parse_date, DayMonthDates};
use emv_utils::numbers::{parse_count, parse_optional_f64};
use rusqlite::params;
use std::collections::BTreeSet;

/// Header fragment marking a region table that reports revaccinations.
const REVACCINATION_HEADER: &str = "ревакцинация";

/// Coverage columns in [`CoverageRecord`] field order.
const COVERAGE_COLUMNS: [&str; 8] = [
    "Administered_Dose1_Recip",
    "Administered_Dose1_Pop_Pct",
    "Administered_Dose1_Recip_65Plus",
    "Administered_Dose1_Recip_65PlusPop_Pct",
    "Series_Complete_Yes",
    "Series_Complete_Pop_Pct",
    "Series_Complete_65Plus",
    "Series_Complete_65PlusPop_Pct",
];

/// Outcome of importing a batch of per-region tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportSummary {
    pub imported: Vec<String>,
    pub skipped: Vec<String>,
    pub rows: usize,
}

fn reader(csv_data: &str, delimiter: u8) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(csv_data.as_bytes())
}

fn column(headers: &StringRecord, name: &str) -> anyhow::Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .with_context(|| format!("missing column {name:?}"))
}

fn field(record: &StringRecord, index: usize) -> &str {
    record.get(index).unwrap_or("").trim()
}

fn required_f64(value: &str, row: usize) -> anyhow::Result<f64> {
    parse_optional_f64(value, row)?.ok_or_else(|| {
        EngineError::UnparsableRecord {
            row,
            reason: "empty numeric field".to_string(),
        }
        .into()
    })
}

/// Parse one scraped per-region vaccination table.
///
/// Rows are listed newest first with day-month dates ("15 октября"); years
/// are assigned by rolling back from `reference`. Values repeating the
/// previous report are cleared and rows without any update dropped.
pub fn parse_region_table(
    region: &str,
    csv_data: &str,
    reference: NaiveDate,
) -> anyhow::Result<Vec<VaccinationRow>> {
    let mut rdr = reader(csv_data, b',');
    let has_revaccination = rdr
        .headers()?
        .iter()
        .any(|h| h.to_lowercase().contains(REVACCINATION_HEADER));

    let mut dates = DayMonthDates::new(reference);
    let mut rows = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let r = result?;
        let date = dates.next_date(field(&r, 0))?;
        let revaccinated = if has_revaccination {
            parse_count(field(&r, 3), row)?
        } else {
            0
        };
        rows.push(VaccinationRow {
            region: region.to_string(),
            date,
            vaccinated: parse_count(field(&r, 1), row)?,
            fully_vaccinated: parse_count(field(&r, 2), row)?,
            revaccinated,
        });
    }
    let parsed = rows.len();
    let rows = clear_stale_repeats(rows);
    log::debug!("{region}: {parsed} rows, {} with updates", rows.len());
    Ok(rows)
}

impl Database {
    /// Load vaccination rows in the cache's own export format.
    ///
    /// # Example CSV
    /// ```text
    /// region,date,vaccinated,fully_vaccinated,revaccinated
    /// Тверская область,2021-10-15,412000,380000,0
    /// ```
    pub fn load_vaccination(&self, csv_data: &str) -> anyhow::Result<usize> {
        let mut rdr = reader(csv_data, b',');
        let mut rows = Vec::new();
        for (row, result) in rdr.records().enumerate() {
            let r = result?;
            rows.push(VaccinationRow {
                region: field(&r, 0).to_string(),
                date: parse_date(field(&r, 1))?,
                vaccinated: parse_count(field(&r, 2), row)?,
                fully_vaccinated: parse_count(field(&r, 3), row)?,
                revaccinated: parse_count(field(&r, 4), row)?,
            });
        }
        self.append_rows(&rows)
    }

    /// Insert vaccination rows in a single transaction.
    pub fn append_rows(&self, rows: &[VaccinationRow]) -> anyhow::Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO vaccination (region, date, vaccinated, fully_vaccinated, revaccinated)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for row in rows {
                stmt.execute(params![
                    row.region,
                    format_date(&row.date),
                    row.vaccinated,
                    row.fully_vaccinated,
                    row.revaccinated
                ])?;
            }
        }
        tx.commit()?;
        log::info!("Loaded {} vaccination rows", rows.len());
        Ok(rows.len())
    }

    /// Import per-region tables, skipping regions already in the cache.
    pub fn import_region_tables(
        &self,
        tables: &[(String, String)],
        reference: NaiveDate,
    ) -> anyhow::Result<ImportSummary> {
        let cached: BTreeSet<String> = self.cached_regions()?;
        let mut summary = ImportSummary::default();
        for (region, csv_data) in tables {
            if cached.contains(region) {
                log::debug!("{region} already cached");
                summary.skipped.push(region.clone());
                continue;
            }
            let rows = parse_region_table(region, csv_data, reference)
                .with_context(|| format!("failed to parse table for {region}"))?;
            summary.rows += self.append_rows(&rows)?;
            summary.imported.push(region.clone());
        }
        log::info!(
            "Imported {} regions ({} rows), {} already cached",
            summary.imported.len(),
            summary.rows,
            summary.skipped.len()
        );
        Ok(summary)
    }

    /// Load monthly mortality. Rows with an empty deaths cell are skipped.
    ///
    /// # Example CSV
    /// ```text
    /// year,month,region,deaths
    /// 2019,10,Тверская область,1720
    /// ```
    pub fn load_monthly_mortality(&self, csv_data: &str) -> anyhow::Result<usize> {
        let mut rdr = reader(csv_data, b',');
        let mut count = 0usize;
        let mut skipped = 0usize;
        for (row, result) in rdr.records().enumerate() {
            let r = result?;
            let Some(deaths) = parse_optional_f64(field(&r, 3), row)? else {
                skipped += 1;
                continue;
            };
            let year: i32 = field(&r, 0)
                .parse()
                .with_context(|| format!("bad year at row {row}"))?;
            let month: u32 = field(&r, 1)
                .parse()
                .with_context(|| format!("bad month at row {row}"))?;
            if !(1..=12).contains(&month) {
                return Err(EngineError::UnparsableRecord {
                    row,
                    reason: format!("month {month} out of range"),
                }
                .into());
            }
            self.conn.execute(
                "INSERT OR REPLACE INTO monthly_mortality (region, year, month, deaths)
                 VALUES (?1, ?2, ?3, ?4)",
                params![field(&r, 2), year, month, deaths],
            )?;
            count += 1;
        }
        log::info!("Loaded {} monthly mortality rows, skipped {} empty", count, skipped);
        Ok(count)
    }

    /// Load one month's mortality comparison table.
    ///
    /// Indented names are sub-rows of the region above and are skipped, as
    /// are rows with an empty value.
    pub fn load_mortality_comparison(&self, period: &str, csv_data: &str) -> anyhow::Result<usize> {
        let mut rdr = reader(csv_data, b';');
        let mut count = 0usize;
        let mut skipped = 0usize;
        for (row, result) in rdr.records().enumerate() {
            let r = result?;
            let raw = r.get(0).unwrap_or("");
            if raw.starts_with(char::is_whitespace) || raw.trim().is_empty() {
                skipped += 1;
                continue;
            }
            let current = parse_optional_f64(field(&r, 5), row)?;
            let previous = parse_optional_f64(field(&r, 6), row)?;
            let (Some(current), Some(previous)) = (current, previous) else {
                skipped += 1;
                continue;
            };
            self.conn.execute(
                "INSERT OR REPLACE INTO mortality_comparison (period, region, current, previous)
                 VALUES (?1, ?2, ?3, ?4)",
                params![period, raw.trim(), current, previous],
            )?;
            count += 1;
        }
        log::info!("Loaded {} comparison rows for {}, skipped {}", count, period, skipped);
        Ok(count)
    }

    /// Load weekly deaths by jurisdiction and age band, keeping only rows
    /// whose `Type` equals `processing`. Suppressed (empty) counts are skipped.
    pub fn load_weekly_deaths(&self, csv_data: &str, processing: &str) -> anyhow::Result<usize> {
        let mut rdr = reader(csv_data, b',');
        let headers = rdr.headers()?.clone();
        let week_end_col = column(&headers, "Week Ending Date")?;
        let state_col = column(&headers, "State Abbreviation")?;
        let age_col = column(&headers, "Age Group")?;
        let deaths_col = column(&headers, "Number of Deaths")?;
        let type_col = column(&headers, "Type")?;

        let tx = self.conn.unchecked_transaction()?;
        let mut count = 0usize;
        let mut skipped = 0usize;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO weekly_deaths (jurisdiction, week_end, age_group, above_65, deaths)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (row, result) in rdr.records().enumerate() {
                let r = result?;
                if field(&r, type_col) != processing {
                    continue;
                }
                let Some(deaths) = parse_optional_f64(field(&r, deaths_col), row)? else {
                    skipped += 1;
                    continue;
                };
                let week_end = parse_any(field(&r, week_end_col))?;
                let age_group = field(&r, age_col);
                stmt.execute(params![
                    field(&r, state_col),
                    format_date(&week_end),
                    age_group,
                    Cohort::is_above_65_band(age_group),
                    deaths
                ])?;
                count += 1;
            }
        }
        tx.commit()?;
        log::info!("Loaded {} weekly death rows, skipped {} suppressed", count, skipped);
        Ok(count)
    }

    /// Load population per region.
    ///
    /// # Example CSV
    /// ```text
    /// region,population
    /// Тверская область,1230171
    /// ```
    pub fn load_population(&self, csv_data: &str) -> anyhow::Result<usize> {
        let mut rdr = reader(csv_data, b',');
        let mut count = 0usize;
        for (row, result) in rdr.records().enumerate() {
            let r = result?;
            let population = required_f64(field(&r, 1), row)?;
            self.conn.execute(
                "INSERT OR REPLACE INTO population (region, population) VALUES (?1, ?2)",
                params![field(&r, 0), population],
            )?;
            count += 1;
        }
        log::info!("Loaded {} population rows", count);
        Ok(count)
    }

    /// Load per-jurisdiction vaccination coverage.
    pub fn load_coverage(&self, csv_data: &str) -> anyhow::Result<usize> {
        let mut rdr = reader(csv_data, b',');
        let headers = rdr.headers()?.clone();
        let date_col = column(&headers, "Date")?;
        let location_col = column(&headers, "Location")?;
        let value_cols = COVERAGE_COLUMNS
            .iter()
            .map(|name| column(&headers, name))
            .collect::<anyhow::Result<Vec<usize>>>()?;

        let tx = self.conn.unchecked_transaction()?;
        let mut count = 0usize;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO coverage (jurisdiction, date, first, first_pct, first_65plus,
                    first_65plus_pct, second, second_pct, second_65plus, second_65plus_pct)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for (row, result) in rdr.records().enumerate() {
                let r = result?;
                let date = parse_any(field(&r, date_col))?;
                let v = value_cols
                    .iter()
                    .map(|col| parse_optional_f64(field(&r, *col), row))
                    .collect::<Result<Vec<Option<f64>>, EngineError>>()?;
                let record = CoverageRecord {
                    first: v[0],
                    first_pct: v[1],
                    first_65plus: v[2],
                    first_65plus_pct: v[3],
                    second: v[4],
                    second_pct: v[5],
                    second_65plus: v[6],
                    second_65plus_pct: v[7],
                };
                stmt.execute(params![
                    field(&r, location_col),
                    format_date(&date),
                    record.first,
                    record.first_pct,
                    record.first_65plus,
                    record.first_65plus_pct,
                    record.second,
                    record.second_pct,
                    record.second_65plus,
                    record.second_65plus_pct
                ])?;
                count += 1;
            }
        }
        tx.commit()?;
        log::info!("Loaded {} coverage rows", count);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    const REGION_TABLE: &str = "\
Дата,Привито,Полностью привито,Ревакцинация
17 октября,1 500,1 200,30
16 октября,1 500,1 100,30
15 октября,1 400,1 100,20
";

    #[test]
    fn parse_region_table_assigns_years_and_clears_repeats() {
        let rows = parse_region_table("Москва", REGION_TABLE, d(2021, 10, 20)).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].date, d(2021, 10, 15));
        assert_eq!(rows[0].vaccinated, 1400);
        // Oct 16: only fully_vaccinated is stale
        assert_eq!(rows[1].vaccinated, 1500);
        assert_eq!(rows[1].fully_vaccinated, 0);
        assert_eq!(rows[1].revaccinated, 30);
        // Oct 17: vaccinated and revaccinated repeat Oct 16
        assert_eq!(rows[2].vaccinated, 0);
        assert_eq!(rows[2].fully_vaccinated, 1200);
        assert_eq!(rows[2].revaccinated, 0);
    }

    #[test]
    fn parse_region_table_without_revaccination() {
        let csv = "Дата,Привито,Полностью привито\n2 января,10,5\n31 декабря,8,4\n";
        let rows = parse_region_table("X", csv, d(2022, 1, 5)).unwrap();
        assert_eq!(rows[0].date, d(2021, 12, 31));
        assert_eq!(rows[1].date, d(2022, 1, 2));
        assert!(rows.iter().all(|r| r.revaccinated == 0));
    }

    #[test]
    fn parse_region_table_rejects_unknown_month() {
        let csv = "Дата,Привито,Полностью привито\n2 бубня,10,5\n";
        let err = parse_region_table("X", csv, d(2022, 1, 5)).unwrap_err();
        assert!(err.to_string().contains("2 бубня"));
    }

    #[test]
    fn import_skips_cached_regions() {
        let db = Database::new().unwrap();
        let tables = vec![("Москва".to_string(), REGION_TABLE.to_string())];
        let first = db.import_region_tables(&tables, d(2021, 10, 20)).unwrap();
        assert_eq!(first.imported, vec!["Москва".to_string()]);
        assert_eq!(first.rows, 3);

        let more = vec![
            ("Москва".to_string(), REGION_TABLE.to_string()),
            ("Тверская область".to_string(), REGION_TABLE.to_string()),
        ];
        let second = db.import_region_tables(&more, d(2021, 10, 20)).unwrap();
        assert_eq!(second.skipped, vec!["Москва".to_string()]);
        assert_eq!(second.imported, vec!["Тверская область".to_string()]);
        assert_eq!(db.cached_regions().unwrap().len(), 2);
    }

    #[test]
    fn load_monthly_mortality_skips_empty() {
        let db = Database::new().unwrap();
        let csv = "year,month,region,deaths\n2019,1,A,100\n2019,2,A,\n2020,1,A,150\n";
        assert_eq!(db.load_monthly_mortality(csv).unwrap(), 2);
        let bad = "year,month,region,deaths\n2019,13,A,100\n";
        assert!(db.load_monthly_mortality(bad).is_err());
    }

    #[test]
    fn load_mortality_comparison_skips_sub_rows() {
        let db = Database::new().unwrap();
        let csv = "\
Регион;a;b;c;d;2021;2020
Тверская область;;;;;1900;1500
  Тверь;;;;;700;600
Архангельская область без автономного округа;;;;;1500;1200
";
        assert_eq!(db.load_mortality_comparison("2021-10", csv).unwrap(), 2);
        let rows = db.query_mortality_comparison("2021-10").unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn load_weekly_deaths_filters_processing_type() {
        let db = Database::new().unwrap();
        let csv = "\
Jurisdiction,Week Ending Date,State Abbreviation,Year,Week,Age Group,Number of Deaths,Time Period,Type
New York,10/02/2021,NY,2021,39,65-74 years,300,2015-2019,Predicted (weighted)
New York,10/02/2021,NY,2021,39,45-64 years,200,2015-2019,Predicted (weighted)
New York,10/02/2021,NY,2021,39,45-64 years,190,2015-2019,Unweighted
New York,10/09/2021,NY,2021,40,45-64 years,,2015-2019,Predicted (weighted)
";
        assert_eq!(db.load_weekly_deaths(csv, "Predicted (weighted)").unwrap(), 2);
        let rows = db.query_weekly_deaths().unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().any(|r| r.above_65 && r.deaths == 300.0));
        assert_eq!(rows[0].week_end, d(2021, 10, 2));
    }

    #[test]
    fn load_coverage_requires_columns() {
        let db = Database::new().unwrap();
        assert!(db.load_coverage("Date,Location\n10/05/2021,NY\n").is_err());
    }
}
