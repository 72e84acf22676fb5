//! Loading downloaded tables into the record cache.

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::ValueEnum;
use emv_db::Database;
use std::path::Path;

/// Kind of table being imported.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Cache export (`region,date,vaccinated,fully_vaccinated,revaccinated`)
    Vaccination,
    /// Directory of scraped per-region tables named `<region>.csv`
    RegionTables,
    /// Monthly deaths per region (`year,month,region,deaths`)
    MonthlyMortality,
    /// One month's `;`-separated comparison table (needs `--period`)
    Comparison,
    /// Weekly deaths by jurisdiction and age group
    Weekly,
    /// Population per region (`region,population`)
    Population,
    /// Vaccination coverage by jurisdiction
    Coverage,
}

fn read(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Read every `*.csv` in `dir` as a `(region, table)` pair, the region
/// being the file stem. Sorted by region.
pub fn read_region_tables(dir: &Path) -> anyhow::Result<Vec<(String, String)>> {
    let mut tables = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }
        let Some(region) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        tables.push((region.to_string(), read(&path)?));
    }
    tables.sort();
    Ok(tables)
}

pub fn run_import(
    db_path: &Path,
    source: Source,
    path: &Path,
    period: Option<&str>,
    reference: Option<NaiveDate>,
    processing: &str,
) -> anyhow::Result<()> {
    let db = Database::open(db_path)?;
    match source {
        Source::Vaccination => {
            db.load_vaccination(&read(path)?)?;
        }
        Source::RegionTables => {
            let reference = reference.unwrap_or_else(|| Local::now().date_naive());
            let tables = read_region_tables(path)?;
            db.import_region_tables(&tables, reference)?;
        }
        Source::MonthlyMortality => {
            db.load_monthly_mortality(&read(path)?)?;
        }
        Source::Comparison => {
            let period = period.context("--period is required for comparison tables")?;
            db.load_mortality_comparison(period, &read(path)?)?;
        }
        Source::Weekly => {
            db.load_weekly_deaths(&read(path)?, processing)?;
        }
        Source::Population => {
            db.load_population(&read(path)?)?;
        }
        Source::Coverage => {
            db.load_coverage(&read(path)?)?;
        }
    }
    Ok(())
}

/// Write the cached vaccination rows to `output` (stdout when omitted).
pub fn run_export(db_path: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let db = Database::open(db_path)?;
    let csv = db.export_vaccination()?;
    match output {
        Some(path) => {
            std::fs::write(path, csv).with_context(|| format!("failed to write {}", path.display()))?;
            log::info!("Exported vaccination cache to {}", path.display());
        }
        None => print!("{csv}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_region_tables() {
        let dir = std::env::temp_dir().join(format!("emv-import-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("Москва.csv"), "Дата,Привито,Полностью привито\n1 октября,1,1\n").unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();
        let tables = read_region_tables(&dir).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].0, "Москва");
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
