use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single dated value of one entity's series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub date: NaiveDate,
    pub value: f64,
}

impl Sample {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Sample { date, value }
    }
}

/// Which cumulative vaccination count a series tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Indicator {
    /// At least one dose
    Vaccinated,
    /// Completed primary course
    FullyVaccinated,
    Revaccinated,
}

impl Indicator {
    pub const ALL: [Indicator; 3] = [
        Indicator::Vaccinated,
        Indicator::FullyVaccinated,
        Indicator::Revaccinated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Indicator::Vaccinated => "vaccinated",
            Indicator::FullyVaccinated => "fully-vaccinated",
            Indicator::Revaccinated => "revaccinated",
        }
    }
}

/// Age cohort of bucketed mortality and coverage data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cohort {
    All,
    Above65,
    Under65,
}

impl Cohort {
    pub const ALL: [Cohort; 3] = [Cohort::All, Cohort::Above65, Cohort::Under65];

    /// Age bands reported separately that make up the 65-and-over cohort.
    const ABOVE_65_BANDS: [&'static str; 3] = ["65-74 years", "75-84 years", "85 years and older"];

    pub fn is_above_65_band(age_group: &str) -> bool {
        Self::ABOVE_65_BANDS.contains(&age_group.trim())
    }

    /// Whether a row from the given age band belongs to this cohort.
    pub fn includes(&self, above_65: bool) -> bool {
        match self {
            Cohort::All => true,
            Cohort::Above65 => above_65,
            Cohort::Under65 => !above_65,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Cohort::All => "all",
            Cohort::Above65 => "above-65",
            Cohort::Under65 => "under-65",
        }
    }
}

/// Coverage counts and percentages reported for one jurisdiction and date.
///
/// `first` counts people with at least one dose, `second` a completed
/// series. Unreported fields are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageRecord {
    pub first: Option<f64>,
    pub first_pct: Option<f64>,
    pub first_65plus: Option<f64>,
    pub first_65plus_pct: Option<f64>,
    pub second: Option<f64>,
    pub second_pct: Option<f64>,
    pub second_65plus: Option<f64>,
    pub second_65plus_pct: Option<f64>,
}

/// One reported row of a region's vaccination table.
///
/// A zero count means "not reported on this date" rather than a true zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaccinationRow {
    pub region: String,
    pub date: NaiveDate,
    pub vaccinated: u32,
    pub fully_vaccinated: u32,
    pub revaccinated: u32,
}

impl VaccinationRow {
    pub fn value(&self, indicator: Indicator) -> u32 {
        match indicator {
            Indicator::Vaccinated => self.vaccinated,
            Indicator::FullyVaccinated => self.fully_vaccinated,
            Indicator::Revaccinated => self.revaccinated,
        }
    }

    fn value_mut(&mut self, indicator: Indicator) -> &mut u32 {
        match indicator {
            Indicator::Vaccinated => &mut self.vaccinated,
            Indicator::FullyVaccinated => &mut self.fully_vaccinated,
            Indicator::Revaccinated => &mut self.revaccinated,
        }
    }

    pub fn is_empty(&self) -> bool {
        Indicator::ALL.iter().all(|i| self.value(*i) == 0)
    }

    /// The strictly positive values of `indicator` as samples.
    pub fn samples(rows: &[VaccinationRow], indicator: Indicator) -> Vec<Sample> {
        rows.iter()
            .filter(|row| row.value(indicator) > 0)
            .map(|row| Sample::new(row.date, row.value(indicator) as f64))
            .collect()
    }
}

/// Blank out values that merely repeat the previous report, then drop rows
/// that carry no update in any indicator.
///
/// Regional tables republish the last known count on days without a new
/// report. Rows must belong to a single region.
pub fn clear_stale_repeats(mut rows: Vec<VaccinationRow>) -> Vec<VaccinationRow> {
    rows.sort_by(|a, b| a.date.cmp(&b.date));
    for indicator in Indicator::ALL {
        let mut previous: Option<u32> = None;
        for row in rows.iter_mut() {
            let value = row.value(indicator);
            if previous == Some(value) {
                *row.value_mut(indicator) = 0;
            }
            previous = Some(value);
        }
    }
    rows.retain(|row| !row.is_empty());
    rows
}
