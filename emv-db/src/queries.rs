//! Typed query methods for reading records back from the cache.

use crate::models::{JurisdictionCoverage, MonthlyMortality, MortalityComparison, WeeklyDeaths};
use crate::Database;
use chrono::{NaiveDate, TimeDelta};
use emv_core::period::TargetPeriod;
use emv_core::sample::{CoverageRecord, VaccinationRow};
use emv_utils::dates::{format_date, parse_date};
use rusqlite::params;
use std::collections::{BTreeMap, BTreeSet};

/// Parse a stored ISO date inside a row mapper.
fn stored_date(value: String) -> rusqlite::Result<NaiveDate> {
    parse_date(&value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

impl Database {
    // ───────────────────── Vaccination ─────────────────────

    /// Regions that already have rows in the cache.
    pub fn cached_regions(&self) -> anyhow::Result<BTreeSet<String>> {
        let mut stmt = self.conn.prepare("SELECT DISTINCT region FROM vaccination")?;
        let regions = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<BTreeSet<String>, _>>()?;
        Ok(regions)
    }

    /// Vaccination rows of one region in date order.
    pub fn query_vaccination(&self, region: &str) -> anyhow::Result<Vec<VaccinationRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT region, date, vaccinated, fully_vaccinated, revaccinated
             FROM vaccination
             WHERE region = ?1
             ORDER BY date",
        )?;
        let rows = stmt
            .query_map(params![region], map_vaccination)?
            .collect::<Result<Vec<_>, _>>()?;
        log::debug!("query_vaccination({region}) returned {} rows", rows.len());
        Ok(rows)
    }

    /// Every cached vaccination row grouped by raw region name.
    pub fn query_vaccination_by_region(&self) -> anyhow::Result<BTreeMap<String, Vec<VaccinationRow>>> {
        let mut stmt = self.conn.prepare(
            "SELECT region, date, vaccinated, fully_vaccinated, revaccinated
             FROM vaccination
             ORDER BY region, date",
        )?;
        let mut grouped: BTreeMap<String, Vec<VaccinationRow>> = BTreeMap::new();
        for row in stmt.query_map([], map_vaccination)? {
            let row = row?;
            grouped.entry(row.region.clone()).or_default().push(row);
        }
        log::info!("query_vaccination_by_region returned {} regions", grouped.len());
        Ok(grouped)
    }

    /// All cached vaccination rows in the format accepted by
    /// [`Database::load_vaccination`].
    pub fn export_vaccination(&self) -> anyhow::Result<String> {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.write_record(["region", "date", "vaccinated", "fully_vaccinated", "revaccinated"])?;
        for rows in self.query_vaccination_by_region()?.values() {
            for row in rows {
                wtr.write_record([
                    row.region.clone(),
                    format_date(&row.date),
                    row.vaccinated.to_string(),
                    row.fully_vaccinated.to_string(),
                    row.revaccinated.to_string(),
                ])?;
            }
        }
        Ok(String::from_utf8(wtr.into_inner()?)?)
    }

    /// Coverage records of every jurisdiction on `date`.
    pub fn query_coverage_on(&self, date: NaiveDate) -> anyhow::Result<Vec<JurisdictionCoverage>> {
        let mut stmt = self.conn.prepare(
            "SELECT jurisdiction, date, first, first_pct, first_65plus, first_65plus_pct,
                    second, second_pct, second_65plus, second_65plus_pct
             FROM coverage
             WHERE date = ?1
             ORDER BY jurisdiction",
        )?;
        let rows = stmt
            .query_map(params![format_date(&date)], |row| {
                Ok(JurisdictionCoverage {
                    jurisdiction: row.get(0)?,
                    date: stored_date(row.get(1)?)?,
                    record: CoverageRecord {
                        first: row.get(2)?,
                        first_pct: row.get(3)?,
                        first_65plus: row.get(4)?,
                        first_65plus_pct: row.get(5)?,
                        second: row.get(6)?,
                        second_pct: row.get(7)?,
                        second_65plus: row.get(8)?,
                        second_65plus_pct: row.get(9)?,
                    },
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        log::info!("query_coverage_on({date}) returned {} records", rows.len());
        Ok(rows)
    }

    // ───────────────────── Mortality ─────────────────────

    pub fn query_monthly_mortality(&self) -> anyhow::Result<Vec<MonthlyMortality>> {
        let mut stmt = self.conn.prepare(
            "SELECT region, year, month, deaths
             FROM monthly_mortality
             ORDER BY region, year, month",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(MonthlyMortality {
                    region: row.get(0)?,
                    year: row.get(1)?,
                    month: row.get(2)?,
                    deaths: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn query_mortality_comparison(&self, period: &str) -> anyhow::Result<Vec<MortalityComparison>> {
        let mut stmt = self.conn.prepare(
            "SELECT region, current, previous
             FROM mortality_comparison
             WHERE period = ?1
             ORDER BY region",
        )?;
        let rows = stmt
            .query_map(params![period], |row| {
                Ok(MortalityComparison {
                    region: row.get(0)?,
                    current: row.get(1)?,
                    previous: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn query_weekly_deaths(&self) -> anyhow::Result<Vec<WeeklyDeaths>> {
        self.weekly_deaths_between("0000-00-00", "9999-99-99")
    }

    /// Weekly rows whose seven-day window overlaps `period`.
    pub fn query_weekly_deaths_overlapping(&self, period: &TargetPeriod) -> anyhow::Result<Vec<WeeklyDeaths>> {
        // A week overlaps when it ends on or after the start and starts
        // before the end, i.e. ends before end + 6 days.
        let last_end = period.end + TimeDelta::days(6);
        self.weekly_deaths_between(&format_date(&period.start), &format_date(&last_end))
    }

    /// Rows with `from <= week_end < until`.
    fn weekly_deaths_between(&self, from: &str, until: &str) -> anyhow::Result<Vec<WeeklyDeaths>> {
        let mut stmt = self.conn.prepare(
            "SELECT jurisdiction, week_end, age_group, above_65, deaths
             FROM weekly_deaths
             WHERE week_end >= ?1 AND week_end < ?2
             ORDER BY week_end, jurisdiction, age_group",
        )?;
        let rows = stmt
            .query_map(params![from, until], |row| {
                Ok(WeeklyDeaths {
                    jurisdiction: row.get(0)?,
                    week_end: stored_date(row.get(1)?)?,
                    age_group: row.get(2)?,
                    above_65: row.get(3)?,
                    deaths: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        log::debug!("weekly_deaths_between({from}, {until}) returned {} rows", rows.len());
        Ok(rows)
    }

    // ───────────────────── Reference ─────────────────────

    pub fn query_population(&self) -> anyhow::Result<BTreeMap<String, f64>> {
        let mut stmt = self.conn.prepare("SELECT region, population FROM population")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<BTreeMap<String, f64>, _>>()?;
        Ok(rows)
    }
}

fn map_vaccination(row: &rusqlite::Row<'_>) -> rusqlite::Result<VaccinationRow> {
    Ok(VaccinationRow {
        region: row.get(0)?,
        date: stored_date(row.get(1)?)?,
        vaccinated: row.get(2)?,
        fully_vaccinated: row.get(3)?,
        revaccinated: row.get(4)?,
    })
}
