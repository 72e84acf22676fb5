//! Monthly excess mortality of the largest regions against their
//! reference-year baseline.

use crate::config::{AnalysisArgs, AnalysisConfig};
use crate::group_by_key;
use crate::output::emit;
use emv_core::error::EngineError;
use emv_core::region::RegionKey;
use emv_data::ratio::top_entities;
use emv_data::{Baseline, MonthlyValue};
use emv_db::models::MonthlyMortality;
use emv_db::Database;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExcessRow {
    pub region: String,
    pub period: String,
    pub ratio: f64,
}

/// A month whose region set differs from the usual one.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageAnomaly {
    pub year: i32,
    pub month: u32,
    pub extra: Vec<RegionKey>,
    pub missing: Vec<RegionKey>,
}

/// Compare the region set of every (year, month) with the most common one.
/// Among equally common sets the largest is taken as the usual one.
pub fn check_coverage(series: &BTreeMap<RegionKey, Vec<MonthlyValue>>) -> Vec<CoverageAnomaly> {
    let mut by_month: BTreeMap<(i32, u32), BTreeSet<RegionKey>> = BTreeMap::new();
    for (key, values) in series {
        for value in values {
            by_month
                .entry((value.year, value.month))
                .or_default()
                .insert(key.clone());
        }
    }

    let mut frequency: BTreeMap<&BTreeSet<RegionKey>, usize> = BTreeMap::new();
    for regions in by_month.values() {
        *frequency.entry(regions).or_default() += 1;
    }
    let Some(usual) = frequency
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| a.0.len().cmp(&b.0.len())))
        .map(|(regions, _)| (*regions).clone())
    else {
        return Vec::new();
    };

    by_month
        .iter()
        .filter(|(_, regions)| **regions != usual)
        .map(|((year, month), regions)| CoverageAnomaly {
            year: *year,
            month: *month,
            extra: regions.difference(&usual).cloned().collect(),
            missing: usual.difference(regions).cloned().collect(),
        })
        .collect()
}

/// Ratios of monthly deaths against the reference-year mean of the same
/// calendar month, for the `top_entities` largest regions.
pub fn compute_excess(db: &Database, config: &AnalysisConfig) -> anyhow::Result<Vec<ExcessRow>> {
    let normalizer = config.normalizer()?;
    let rows = db.query_monthly_mortality()?;
    let grouped = group_by_key(
        &normalizer,
        rows.into_iter().map(|MonthlyMortality { region, year, month, deaths }| {
            (region, MonthlyValue { year, month, value: deaths })
        }),
    );

    let mut series: BTreeMap<RegionKey, Vec<MonthlyValue>> = BTreeMap::new();
    for (key, values) in grouped {
        let mut by_month: BTreeMap<(i32, u32), MonthlyValue> = BTreeMap::new();
        for value in values {
            if by_month.insert((value.year, value.month), value).is_some() {
                log::warn!("{key}: several rows for {}-{:02}, keeping the last", value.year, value.month);
            }
        }
        series.insert(key, by_month.into_values().collect());
    }

    for anomaly in check_coverage(&series) {
        log::warn!(
            "{}-{:02}: extra regions {:?}, missing regions {:?}",
            anomaly.year,
            anomaly.month,
            anomaly.extra.iter().map(RegionKey::as_str).collect::<Vec<_>>(),
            anomaly.missing.iter().map(RegionKey::as_str).collect::<Vec<_>>()
        );
    }

    let last_year = config.baseline_last_year;
    let work: Vec<(RegionKey, Vec<MonthlyValue>)> = series.into_iter().collect();
    let outcomes = config.pool()?.run(work, |key, values| {
        let baseline = Baseline::from_reference(&values, last_year);
        if baseline.is_empty() {
            return Err(EngineError::EmptySeries(key.to_string()));
        }
        Ok((baseline, values))
    })?;

    let baselines: BTreeMap<RegionKey, Baseline> = outcomes
        .results
        .iter()
        .map(|(key, (baseline, _))| (key.clone(), baseline.clone()))
        .collect();
    let top = top_entities(&baselines, config.top_entities);
    log::info!("Reporting excess mortality for {} of {} regions", top.len(), baselines.len());

    let mut out = Vec::new();
    for key in top {
        let (baseline, values) = &outcomes.results[&key];
        out.extend(baseline.ratios(&key, values, last_year).into_iter().map(|ratio| ExcessRow {
            region: ratio.entity_key.to_string(),
            period: ratio.period_tag,
            ratio: ratio.value,
        }));
    }
    Ok(out)
}

pub fn run_excess(args: &AnalysisArgs) -> anyhow::Result<()> {
    let config = args.config()?;
    let db = Database::open(&args.db)?;
    let rows = compute_excess(&db, &config)?;
    emit(&rows, args.format, args.output.as_deref())
}
