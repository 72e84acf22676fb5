//! Regional vaccination level against the excess mortality of a month.

use crate::config::{AnalysisArgs, AnalysisConfig};
use crate::group_by_key;
use crate::output::emit;
use emv_core::period::TargetPeriod;
use emv_core::region::RegionKey;
use emv_core::sample::{Indicator, VaccinationRow};
use emv_core::series::SeriesIndex;
use emv_data::coverage::unvaccinated_share;
use emv_data::{ratio, AlignmentResult};
use emv_db::Database;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VaccinationPoint {
    pub region: String,
    pub period: String,
    pub indicator: &'static str,
    pub unvaccinated_share: f64,
    pub ratio: f64,
}

/// Spread of absolute correction magnitudes over a batch of alignments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MagnitudeSummary {
    pub count: usize,
    pub min: f64,
    pub median: f64,
    pub max: f64,
}

impl fmt::Display for MagnitudeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "n={} min={:.4} median={:.4} max={:.4}",
            self.count, self.min, self.median, self.max
        )
    }
}

pub fn magnitude_summary<'a>(
    results: impl IntoIterator<Item = &'a AlignmentResult>,
) -> Option<MagnitudeSummary> {
    let mut magnitudes: Vec<f64> = results
        .into_iter()
        .map(|r| r.correction_magnitude.abs())
        .collect();
    magnitudes.sort_by(f64::total_cmp);
    let count = magnitudes.len();
    let (&min, &max) = (magnitudes.first()?, magnitudes.last()?);
    let median = if count % 2 == 1 {
        magnitudes[count / 2]
    } else {
        (magnitudes[count / 2 - 1] + magnitudes[count / 2]) / 2.0
    };
    Some(MagnitudeSummary {
        count,
        min,
        median,
        max,
    })
}

/// Mortality ratios of regions with a significant previous-year count.
fn mortality_ratios(
    db: &Database,
    config: &AnalysisConfig,
    period: &TargetPeriod,
) -> anyhow::Result<BTreeMap<RegionKey, f64>> {
    let normalizer = config.normalizer()?;
    let tag = period.to_string();
    let rows = db.query_mortality_comparison(&tag)?;
    let total = rows.len();
    let grouped = group_by_key(
        &normalizer,
        rows.into_iter()
            .filter(|row| row.previous > config.min_baseline)
            .map(|row| (row.region, (row.current, row.previous))),
    );

    let mut ratios = BTreeMap::new();
    for (key, values) in grouped {
        let Some(&(current, previous)) = values.last() else {
            continue;
        };
        match ratio(&key, &tag, current, previous) {
            Ok(r) if r.value > 0.0 => {
                ratios.insert(key, r.value);
            }
            Ok(_) => log::debug!("{key}: zero mortality ratio for {tag}"),
            Err(e) => log::debug!("{e}"),
        }
    }
    log::info!("{tag}: {} of {} mortality rows usable", ratios.len(), total);
    Ok(ratios)
}

/// Join vaccination at the border date of each month with the month's
/// mortality ratio and the regional population.
pub fn compute_vaccination(
    db: &Database,
    config: &AnalysisConfig,
    months: &[TargetPeriod],
) -> anyhow::Result<Vec<VaccinationPoint>> {
    let normalizer = config.normalizer()?;
    let aligner = config.aligner();
    let pool = config.pool()?;

    let population: BTreeMap<RegionKey, f64> = group_by_key(&normalizer, db.query_population()?)
        .into_iter()
        .filter_map(|(key, values)| values.last().map(|p| (key, *p)))
        .collect();
    let vaccination: BTreeMap<RegionKey, Vec<VaccinationRow>> = group_by_key(
        &normalizer,
        db.query_vaccination_by_region()?,
    )
    .into_iter()
    .map(|(key, tables)| (key, tables.into_iter().flatten().collect()))
    .collect();

    let mut points = Vec::new();
    for period in months {
        let tag = period.to_string();
        let ratios = mortality_ratios(db, config, period)?;
        let border = config.border_date(period.start);
        let request = config.alignment_request(border)?;

        for indicator in Indicator::ALL {
            let work: Vec<(RegionKey, &Vec<VaccinationRow>)> = vaccination
                .iter()
                .filter(|(key, _)| ratios.contains_key(*key) && population.contains_key(*key))
                .map(|(key, rows)| (key.clone(), rows))
                .collect();
            let outcomes = pool.run(work, |key, rows| {
                let index = SeriesIndex::new(key.as_str(), VaccinationRow::samples(rows, indicator))?;
                aligner.checked(&index, &request)
            })?;
            if let Some(summary) = magnitude_summary(outcomes.results.values()) {
                log::debug!("{tag} {}: accepted corrections {summary}", indicator.as_str());
            }

            let before = points.len();
            for (key, aligned) in &outcomes.results {
                let Some(share) = unvaccinated_share(aligned.value, population[key]) else {
                    continue;
                };
                let ratio = ratios[key];
                if share < 1.0 && ratio > 0.0 {
                    points.push(VaccinationPoint {
                        region: key.to_string(),
                        period: tag.clone(),
                        indicator: indicator.as_str(),
                        unvaccinated_share: share,
                        ratio,
                    });
                }
            }
            log::info!(
                "{tag} {}: {} points, {} regions rejected",
                indicator.as_str(),
                points.len() - before,
                outcomes.skipped.len()
            );
        }
    }
    Ok(points)
}

pub fn run_vaccination(args: &AnalysisArgs, months: &[TargetPeriod]) -> anyhow::Result<()> {
    let config = args.config()?;
    let db = Database::open(&args.db)?;
    let points = compute_vaccination(&db, &config, months)?;
    emit(&points, args.format, args.output.as_deref())
}
