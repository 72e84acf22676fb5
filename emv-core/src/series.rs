use crate::error::{EngineError, Result};
use crate::sample::Sample;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// A date-ordered, duplicate-free series of samples for one entity.
///
/// Never empty: construction fails on an empty input.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesIndex {
    entity: String,
    samples: Vec<Sample>,
}

/// The pair of samples surrounding (or nearest to) a target date.
///
/// Inside the sampled range `lower.date <= target <= upper.date`. Past either
/// edge both samples sit on the same side of the target. A one-sided bracket
/// only occurs for a single-sample series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bracket<'a> {
    pub lower: Option<&'a Sample>,
    pub upper: Option<&'a Sample>,
}

impl SeriesIndex {
    /// Build an index from samples in any order. When two samples share a
    /// date the one seen last wins.
    pub fn new(entity: impl Into<String>, samples: impl IntoIterator<Item = Sample>) -> Result<Self> {
        let entity = entity.into();
        let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for (row, sample) in samples.into_iter().enumerate() {
            if !sample.value.is_finite() {
                return Err(EngineError::UnparsableRecord {
                    row,
                    reason: format!("non-finite value for {entity} on {}", sample.date),
                });
            }
            by_date.insert(sample.date, sample.value);
        }
        if by_date.is_empty() {
            return Err(EngineError::EmptySeries(entity));
        }
        let samples = by_date
            .into_iter()
            .map(|(date, value)| Sample::new(date, value))
            .collect();
        Ok(SeriesIndex { entity, samples })
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn first(&self) -> &Sample {
        &self.samples[0]
    }

    pub fn last(&self) -> &Sample {
        &self.samples[self.samples.len() - 1]
    }

    /// The value recorded exactly on `date`, if any.
    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.samples
            .binary_search_by(|s| s.date.cmp(&date))
            .ok()
            .map(|i| self.samples[i].value)
    }

    /// Locate the tightest bracket around `target` by binary search.
    ///
    /// Past the last sample the two most recent samples are returned, before
    /// the first sample the two earliest, so the caller can extrapolate.
    pub fn bracket(&self, target: NaiveDate) -> Bracket<'_> {
        let samples = &self.samples;
        let n = samples.len();
        let idx = samples.partition_point(|s| s.date < target);

        if n == 1 {
            let only = &samples[0];
            return match only.date.cmp(&target) {
                std::cmp::Ordering::Equal => Bracket::pair(only, only),
                std::cmp::Ordering::Less => Bracket {
                    lower: Some(only),
                    upper: None,
                },
                std::cmp::Ordering::Greater => Bracket {
                    lower: None,
                    upper: Some(only),
                },
            };
        }

        if idx == n {
            Bracket::pair(&samples[n - 2], &samples[n - 1])
        } else if samples[idx].date == target {
            Bracket::pair(&samples[idx], &samples[idx])
        } else if idx == 0 {
            Bracket::pair(&samples[0], &samples[1])
        } else {
            Bracket::pair(&samples[idx - 1], &samples[idx])
        }
    }
}

impl<'a> Bracket<'a> {
    fn pair(lower: &'a Sample, upper: &'a Sample) -> Self {
        Bracket {
            lower: Some(lower),
            upper: Some(upper),
        }
    }

    /// True when `target` lies strictly between the two samples.
    pub fn surrounds(&self, target: NaiveDate) -> bool {
        match (self.lower, self.upper) {
            (Some(lower), Some(upper)) => lower.date < target && target < upper.date,
            _ => false,
        }
    }
}
