//! Ratios of a current value against a baseline, and baselines built from
//! reference years.

use emv_core::error::{EngineError, Result};
use emv_core::region::RegionKey;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ratio {
    pub entity_key: RegionKey,
    pub period_tag: String,
    pub value: f64,
}

/// `current / baseline` for one entity and period.
///
/// Fails with [`EngineError::NonPositiveBaseline`] when the baseline is zero,
/// negative or NaN. A zero current value is a valid ratio of zero.
pub fn ratio(entity_key: &RegionKey, period_tag: &str, current: f64, baseline: f64) -> Result<Ratio> {
    if !(baseline > 0.0) {
        return Err(EngineError::NonPositiveBaseline {
            entity: entity_key.to_string(),
            baseline,
        });
    }
    Ok(Ratio {
        entity_key: entity_key.clone(),
        period_tag: period_tag.to_string(),
        value: current / baseline,
    })
}

/// One monthly observation of an entity's series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonthlyValue {
    pub year: i32,
    pub month: u32,
    pub value: f64,
}

/// Per calendar month mean over the reference years.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Baseline {
    by_month: BTreeMap<u32, f64>,
    level: f64,
}

impl Baseline {
    /// Average each calendar month over every year up to and including
    /// `last_year`. Means are rounded half away from zero.
    pub fn from_reference<'a, I>(values: I, last_year: i32) -> Self
    where
        I: IntoIterator<Item = &'a MonthlyValue>,
    {
        let mut sums: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
        for value in values.into_iter().filter(|v| v.year <= last_year) {
            let entry = sums.entry(value.month).or_insert((0.0, 0));
            entry.0 += value.value;
            entry.1 += 1;
        }

        let (total, count) = sums
            .values()
            .fold((0.0, 0), |(t, c), (sum, n)| (t + sum, c + n));
        let by_month = sums
            .into_iter()
            .map(|(month, (sum, n))| (month, (sum / n as f64).round()))
            .collect();

        Baseline {
            by_month,
            level: if count == 0 { 0.0 } else { total / count as f64 },
        }
    }

    pub fn for_month(&self, month: u32) -> Option<f64> {
        self.by_month.get(&month).copied()
    }

    /// Mean of every reference observation, used to rank entities by size.
    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn is_empty(&self) -> bool {
        self.by_month.is_empty()
    }

    /// Ratios of every observation after the reference years against the
    /// baseline of its calendar month. Months without a usable baseline are
    /// skipped.
    pub fn ratios<'a, I>(&self, entity_key: &RegionKey, values: I, last_year: i32) -> Vec<Ratio>
    where
        I: IntoIterator<Item = &'a MonthlyValue>,
    {
        values
            .into_iter()
            .filter(|v| v.year > last_year)
            .filter_map(|v| {
                let baseline = self.for_month(v.month)?;
                let tag = format!("{}-{:02}", v.year, v.month);
                match ratio(entity_key, &tag, v.value, baseline) {
                    Ok(ratio) => Some(ratio),
                    Err(e) => {
                        log::debug!("Skipping {tag}: {e}");
                        None
                    }
                }
            })
            .collect()
    }
}

/// The `n` entities with the largest baseline level, largest first. Ties are
/// broken by key so the selection is deterministic.
pub fn top_entities(baselines: &BTreeMap<RegionKey, Baseline>, n: usize) -> Vec<RegionKey> {
    let mut ranked: Vec<(&RegionKey, f64)> = baselines.iter().map(|(k, b)| (k, b.level())).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked.into_iter().take(n).map(|(k, _)| k.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> RegionKey {
        RegionKey::new(name)
    }

    fn mv(year: i32, month: u32, value: f64) -> MonthlyValue {
        MonthlyValue { year, month, value }
    }

    #[test]
    fn test_ratio() {
        let r = ratio(&key("Тверская"), "2021-10", 500.0, 250.0).unwrap();
        assert_eq!(r.value, 2.0);
        assert_eq!(r.period_tag, "2021-10");
        assert_eq!(ratio(&key("X"), "p", 0.0, 10.0).unwrap().value, 0.0);
    }

    #[test]
    fn test_ratio_non_positive_baseline() {
        assert_eq!(
            ratio(&key("X"), "p", 500.0, 0.0),
            Err(EngineError::NonPositiveBaseline {
                entity: "X".into(),
                baseline: 0.0
            })
        );
        assert!(ratio(&key("X"), "p", 500.0, -3.0).is_err());
        assert!(ratio(&key("X"), "p", 500.0, f64::NAN).is_err());
    }

    #[test]
    fn test_baseline_from_reference_years() {
        let values = vec![
            mv(2017, 1, 100.0),
            mv(2018, 1, 101.0),
            mv(2019, 1, 104.0),
            mv(2019, 2, 80.0),
            mv(2020, 1, 150.0),
        ];
        let baseline = Baseline::from_reference(&values, 2019);
        // (100 + 101 + 104) / 3 = 101.67
        assert_eq!(baseline.for_month(1), Some(102.0));
        assert_eq!(baseline.for_month(2), Some(80.0));
        assert_eq!(baseline.for_month(3), None);
        assert!((baseline.level() - 385.0 / 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_baseline_mean_rounds_half_away_from_zero() {
        let values = vec![mv(2018, 5, 10.0), mv(2019, 5, 11.0)];
        assert_eq!(Baseline::from_reference(&values, 2019).for_month(5), Some(11.0));
    }

    #[test]
    fn test_ratios_after_reference_years() {
        let values = vec![
            mv(2019, 1, 100.0),
            mv(2019, 2, 0.0),
            mv(2020, 1, 150.0),
            mv(2020, 2, 90.0),
            mv(2020, 3, 90.0),
        ];
        let baseline = Baseline::from_reference(&values, 2019);
        let ratios = baseline.ratios(&key("A"), &values, 2019);
        // February has a zero baseline and March none at all
        assert_eq!(ratios.len(), 1);
        assert_eq!(ratios[0].period_tag, "2020-01");
        assert_eq!(ratios[0].value, 1.5);
    }

    #[test]
    fn test_top_entities() {
        let mut baselines = BTreeMap::new();
        baselines.insert(key("A"), Baseline::from_reference(&[mv(2019, 1, 10.0)], 2019));
        baselines.insert(key("B"), Baseline::from_reference(&[mv(2019, 1, 30.0)], 2019));
        baselines.insert(key("C"), Baseline::from_reference(&[mv(2019, 1, 20.0)], 2019));
        baselines.insert(key("D"), Baseline::from_reference(&[mv(2019, 1, 30.0)], 2019));
        assert_eq!(top_entities(&baselines, 3), vec![key("B"), key("D"), key("C")]);
        assert_eq!(top_entities(&baselines, 10).len(), 4);
    }
}
