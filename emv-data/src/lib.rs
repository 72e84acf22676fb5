//! Alignment, apportionment and ratio computation.
//!
//! This crate turns normalized series from `emv-core` into comparable
//! point estimates and period totals.

pub mod align;
pub mod apportion;
pub mod parallel;
pub mod ratio;

pub use align::{Aligner, AlignmentMode, AlignmentRequest, AlignmentResult};
pub use apportion::{apportion, period_total, ApportionmentResult};
pub use parallel::{EntityPool, Outcomes};
pub use ratio::{ratio, Baseline, MonthlyValue, Ratio};

/// Population shares derived from vaccination coverage.
pub mod coverage {
    use emv_core::sample::{Cohort, CoverageRecord};

    /// Share of `population` not covered by `vaccinated`.
    ///
    /// `None` for a non-positive population. The share is negative when the
    /// vaccinated count exceeds the population, which callers filter out.
    pub fn unvaccinated_share(vaccinated: f64, population: f64) -> Option<f64> {
        if population > 0.0 {
            Some(1.0 - vaccinated / population)
        } else {
            None
        }
    }

    /// Share not covered, given coverage as a percentage.
    pub fn share_from_percent(percent: f64) -> f64 {
        1.0 - percent / 100.0
    }

    /// Unvaccinated shares `(first dose, completed series)` for a cohort.
    ///
    /// The under-65 cohort is not reported directly. Its population is
    /// recovered from the counts and percentages of the other two.
    pub fn cohort_shares(record: &CoverageRecord, cohort: Cohort) -> Option<(f64, f64)> {
        match cohort {
            Cohort::All => Some((
                share_from_percent(record.first_pct?),
                share_from_percent(record.second_pct?),
            )),
            Cohort::Above65 => Some((
                share_from_percent(record.first_65plus_pct?),
                share_from_percent(record.second_65plus_pct?),
            )),
            Cohort::Under65 => {
                let population = population_from(record.first?, record.first_pct?)?;
                let population_65 = population_from(record.first_65plus?, record.first_65plus_pct?)?;
                let under_65 = population - population_65;
                Some((
                    unvaccinated_share(record.first? - record.first_65plus?, under_65)?,
                    unvaccinated_share(record.second? - record.second_65plus?, under_65)?,
                ))
            }
        }
    }

    fn population_from(count: f64, percent: f64) -> Option<f64> {
        (percent > 0.0).then(|| count * 100.0 / percent)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_cohort_shares() {
            let coverage = CoverageRecord {
                first: Some(600.0),
                first_pct: Some(60.0),
                first_65plus: Some(180.0),
                first_65plus_pct: Some(90.0),
                second: Some(500.0),
                second_pct: Some(50.0),
                second_65plus: Some(160.0),
                second_65plus_pct: Some(80.0),
            };
            let (first, second) = cohort_shares(&coverage, Cohort::All).unwrap();
            assert!((first - 0.4).abs() < 1e-12 && (second - 0.5).abs() < 1e-12);
            let (first, _) = cohort_shares(&coverage, Cohort::Above65).unwrap();
            assert!((first - 0.1).abs() < 1e-12);
            // 1000 people, 200 of them 65+, so 800 under 65 with 420 and 340 covered
            let (first, second) = cohort_shares(&coverage, Cohort::Under65).unwrap();
            assert!((first - (1.0 - 420.0 / 800.0)).abs() < 1e-12);
            assert!((second - (1.0 - 340.0 / 800.0)).abs() < 1e-12);
        }

        #[test]
        fn test_cohort_shares_missing_fields() {
            let coverage = CoverageRecord {
                first_pct: Some(60.0),
                second_pct: Some(50.0),
                ..Default::default()
            };
            assert!(cohort_shares(&coverage, Cohort::All).is_some());
            assert_eq!(cohort_shares(&coverage, Cohort::Under65), None);
        }

        #[test]
        fn test_unvaccinated_share() {
            assert_eq!(unvaccinated_share(250.0, 1000.0), Some(0.75));
            assert_eq!(unvaccinated_share(0.0, 1000.0), Some(1.0));
            assert_eq!(unvaccinated_share(10.0, 0.0), None);
            assert!(unvaccinated_share(1200.0, 1000.0).unwrap() < 0.0);
        }

        #[test]
        fn test_share_from_percent() {
            assert!((share_from_percent(60.0) - 0.4).abs() < 1e-12);
            assert_eq!(share_from_percent(0.0), 1.0);
        }
    }
}
