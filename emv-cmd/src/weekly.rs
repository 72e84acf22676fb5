//! Weekly death counts apportioned to calendar months, per age cohort,
//! against vaccination coverage on the border date.

use crate::config::{AnalysisArgs, AnalysisConfig};
use crate::group_by_key;
use crate::output::emit;
use emv_core::period::{PeriodBucket, TargetPeriod};
use emv_core::region::RegionKey;
use emv_core::sample::{Cohort, CoverageRecord};
use emv_data::coverage::cohort_shares;
use emv_data::{period_total, ratio};
use emv_db::models::WeeklyDeaths;
use emv_db::Database;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortPoint {
    pub jurisdiction: String,
    pub period: String,
    pub cohort: &'static str,
    pub first_dose_unvaccinated: f64,
    pub series_incomplete: f64,
    pub ratio: f64,
}

/// Buckets of one jurisdiction for the target month and the same month a
/// year earlier.
struct JurisdictionWeeks {
    current: Vec<WeeklyDeaths>,
    previous: Vec<WeeklyDeaths>,
}

fn cohort_buckets(rows: &[WeeklyDeaths], cohort: Cohort) -> Vec<PeriodBucket> {
    rows.iter()
        .filter(|row| cohort.includes(row.above_65))
        .map(WeeklyDeaths::bucket)
        .collect()
}

/// Year-over-year ratio of apportioned deaths for every cohort with data
/// in both months. Ratios at or below `min_ratio` are dropped.
fn cohort_ratios(
    key: &RegionKey,
    weeks: &JurisdictionWeeks,
    period: &TargetPeriod,
    min_ratio: f64,
) -> Vec<(Cohort, f64)> {
    let previous_period = period.shift_months(-12);
    let tag = period.to_string();
    Cohort::ALL
        .into_iter()
        .filter_map(|cohort| {
            let current = period_total(&cohort_buckets(&weeks.current, cohort), period)?;
            let previous = period_total(&cohort_buckets(&weeks.previous, cohort), &previous_period)?;
            match ratio(key, &tag, current, previous) {
                Ok(r) if r.value > min_ratio => Some((cohort, r.value)),
                Ok(r) => {
                    log::debug!("{key} {}: ratio {:.3} dropped", cohort.as_str(), r.value);
                    None
                }
                Err(e) => {
                    log::debug!("{key} {}: {e}", cohort.as_str());
                    None
                }
            }
        })
        .collect()
}

pub fn compute_weekly(
    db: &Database,
    config: &AnalysisConfig,
    months: &[TargetPeriod],
) -> anyhow::Result<Vec<CohortPoint>> {
    let normalizer = config.normalizer()?;
    let pool = config.pool()?;

    let mut points = Vec::new();
    for period in months {
        let tag = period.to_string();
        let previous_period = period.shift_months(-12);

        let mut weeks: BTreeMap<RegionKey, JurisdictionWeeks> = BTreeMap::new();
        let current = db.query_weekly_deaths_overlapping(period)?;
        for (key, rows) in group_by_key(&normalizer, current.into_iter().map(|r| (r.jurisdiction.clone(), r))) {
            weeks.insert(
                key,
                JurisdictionWeeks {
                    current: rows,
                    previous: Vec::new(),
                },
            );
        }
        let previous = db.query_weekly_deaths_overlapping(&previous_period)?;
        for (key, rows) in group_by_key(&normalizer, previous.into_iter().map(|r| (r.jurisdiction.clone(), r))) {
            if let Some(entry) = weeks.get_mut(&key) {
                entry.previous = rows;
            }
        }

        let border = config.border_date(period.start);
        let coverage: BTreeMap<RegionKey, CoverageRecord> = group_by_key(
            &normalizer,
            db.query_coverage_on(border)?
                .into_iter()
                .map(|c| (c.jurisdiction, c.record)),
        )
        .into_iter()
        .filter_map(|(key, records)| records.last().map(|r| (key, *r)))
        .collect();
        if coverage.is_empty() {
            log::warn!("{tag}: no coverage reported on {border}");
        }

        let min_ratio = config.min_ratio;
        let work: Vec<(RegionKey, JurisdictionWeeks)> = weeks
            .into_iter()
            .filter(|(key, _)| coverage.contains_key(key))
            .collect();
        let outcomes = pool.run(work, |key, weeks| Ok(cohort_ratios(key, &weeks, period, min_ratio)))?;

        let before = points.len();
        for (key, ratios) in &outcomes.results {
            let record = &coverage[key];
            for (cohort, ratio) in ratios {
                let Some((first, second)) = cohort_shares(record, *cohort) else {
                    log::debug!("{key} {}: coverage incomplete", cohort.as_str());
                    continue;
                };
                points.push(CohortPoint {
                    jurisdiction: key.to_string(),
                    period: tag.clone(),
                    cohort: cohort.as_str(),
                    first_dose_unvaccinated: first,
                    series_incomplete: second,
                    ratio: *ratio,
                });
            }
        }
        log::info!(
            "{tag}: {} cohort points from {} jurisdictions",
            points.len() - before,
            outcomes.results.len()
        );
    }
    Ok(points)
}

pub fn run_weekly(args: &AnalysisArgs, months: &[TargetPeriod]) -> anyhow::Result<()> {
    let config = args.config()?;
    let db = Database::open(&args.db)?;
    let points = compute_weekly(&db, &config, months)?;
    emit(&points, args.format, args.output.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use emv_core::region::NamingConvention;

    const WEEKLY: &str = "\
Week Ending Date,State Abbreviation,Age Group,Number of Deaths,Type
2020-10-03,NY,45-64 years,700,Predicted (weighted)
2020-10-03,NY,65-74 years,1400,Predicted (weighted)
2020-10-31,NY,45-64 years,700,Predicted (weighted)
2020-10-31,NY,65-74 years,1400,Predicted (weighted)
2021-10-02,NY,45-64 years,1400,Predicted (weighted)
2021-10-02,NY,65-74 years,1400,Predicted (weighted)
2021-10-30,NY,45-64 years,700,Predicted (weighted)
2021-10-30,NY,65-74 years,350,Predicted (weighted)
2021-10-30,US,45-64 years,9000,Predicted (weighted)
2020-10-31,US,45-64 years,9000,Predicted (weighted)
";

    const COVERAGE: &str = "\
Date,Location,Administered_Dose1_Recip,Administered_Dose1_Pop_Pct,Administered_Dose1_Recip_65Plus,Administered_Dose1_Recip_65PlusPop_Pct,Series_Complete_Yes,Series_Complete_Pop_Pct,Series_Complete_65Plus,Series_Complete_65PlusPop_Pct
09/26/2021,NY,600,60,180,90,500,50,160,80
09/26/2021,US,600,60,180,90,500,50,160,80
";

    #[test]
    fn test_compute_weekly_cohorts() {
        let db = Database::new().unwrap();
        db.load_weekly_deaths(WEEKLY, "Predicted (weighted)").unwrap();
        db.load_coverage(COVERAGE).unwrap();
        let config = AnalysisConfig {
            convention: NamingConvention::UnitedStates,
            min_ratio: 0.3,
            ..Default::default()
        };
        let october = TargetPeriod::month(2021, 10).unwrap();
        let points = compute_weekly(&db, &config, &[october]).unwrap();

        // US is the national aggregate and never reported
        assert!(points.iter().all(|p| p.jurisdiction == "NY"));

        // Week ending Oct 2 2021 puts 2 of 7 days into October:
        //   under 65: 400 + 700 = 1100, above 65: 400 + 350 = 750
        // Week ending Oct 3 2020 puts 3 of 7 days into October 2020:
        //   under 65: 300 + 700 = 1000, above 65: 600 + 1400 = 2000
        let by_cohort: BTreeMap<&str, &CohortPoint> = points.iter().map(|p| (p.cohort, p)).collect();
        assert!((by_cohort["under-65"].ratio - 1.1).abs() < 1e-12);
        assert!((by_cohort["all"].ratio - 1850.0 / 3000.0).abs() < 1e-12);
        // 750 / 2000 = 0.375 survives a 0.3 floor
        assert!((by_cohort["above-65"].ratio - 0.375).abs() < 1e-12);
        assert!((by_cohort["all"].first_dose_unvaccinated - 0.4).abs() < 1e-12);

        let strict = AnalysisConfig {
            min_ratio: 0.5,
            ..config
        };
        let points = compute_weekly(&db, &strict, &[october]).unwrap();
        assert!(points.iter().all(|p| p.cohort != "above-65"));
    }
}
