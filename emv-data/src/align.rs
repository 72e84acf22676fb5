//! Point estimates of a cumulative series at an arbitrary date.
//!
//! The estimate starts from whichever bracketing sample is nearer in time
//! and moves along the slope between the two samples, measured per business
//! day. How far it moves, relative to the farther sample, is the correction
//! magnitude; estimates that move too far are rejected rather than used.

use chrono::NaiveDate;
use emv_core::calendar::BusinessCalendar;
use emv_core::error::{EngineError, Result};
use emv_core::sample::Sample;
use emv_core::series::SeriesIndex;
use serde::Serialize;

/// Target date plus the trust bounds for the two estimation modes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignmentRequest {
    pub target: NaiveDate,
    pub interpolate_bound: f64,
    pub extrapolate_bound: f64,
}

impl AlignmentRequest {
    /// Both bounds must lie in the open interval (0, 1).
    pub fn new(target: NaiveDate, interpolate_bound: f64, extrapolate_bound: f64) -> Result<Self> {
        for bound in [interpolate_bound, extrapolate_bound] {
            if !(bound > 0.0 && bound < 1.0) {
                return Err(EngineError::InvalidBound(bound));
            }
        }
        Ok(AlignmentRequest {
            target,
            interpolate_bound,
            extrapolate_bound,
        })
    }

    pub fn bound_for(&self, mode: AlignmentMode) -> f64 {
        match mode {
            AlignmentMode::Interpolation | AlignmentMode::Exact => self.interpolate_bound,
            AlignmentMode::Extrapolation => self.extrapolate_bound,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlignmentMode {
    /// A sample exists on the target date
    Exact,
    /// Target strictly between two samples
    Interpolation,
    /// Target outside the sampled range
    Extrapolation,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AlignmentResult {
    /// Meaningful only when `accepted`
    pub value: f64,
    /// Adjustment relative to the farther sample. Positive for interpolation,
    /// negative for extrapolation overshoot.
    pub correction_magnitude: f64,
    pub mode: AlignmentMode,
    pub accepted: bool,
}

impl AlignmentResult {
    pub fn estimate(&self) -> Option<f64> {
        self.accepted.then_some(self.value)
    }

    fn unchanged(sample: &Sample, mode: AlignmentMode) -> Self {
        AlignmentResult {
            value: sample.value.max(0.0),
            correction_magnitude: 0.0,
            mode,
            accepted: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Aligner {
    calendar: BusinessCalendar,
}

impl Aligner {
    pub fn new(calendar: BusinessCalendar) -> Self {
        Aligner { calendar }
    }

    pub fn calendar(&self) -> &BusinessCalendar {
        &self.calendar
    }

    pub fn align(&self, index: &SeriesIndex, request: &AlignmentRequest) -> AlignmentResult {
        let target = request.target;
        let bracket = index.bracket(target);
        let (lower, upper) = match (bracket.lower, bracket.upper) {
            (Some(lower), Some(upper)) => (lower, upper),
            (Some(only), None) | (None, Some(only)) => (only, only),
            (None, None) => (index.first(), index.first()),
        };

        let mode = if lower.date == target && upper.date == target {
            AlignmentMode::Exact
        } else if bracket.surrounds(target) {
            AlignmentMode::Interpolation
        } else {
            AlignmentMode::Extrapolation
        };

        let to_lower = (target - lower.date).num_days().abs();
        let to_upper = (upper.date - target).num_days().abs();
        let (nearer, farther) = if to_upper < to_lower {
            (upper, lower)
        } else {
            (lower, upper)
        };

        let span = self.calendar.busday_count(lower.date, upper.date);
        let offset = self.calendar.busday_count(nearer.date, target);
        if span == 0 || offset == 0 {
            return AlignmentResult::unchanged(nearer, mode);
        }

        let slope = (upper.value - lower.value) / span as f64;
        let estimate = nearer.value + slope * offset as f64;

        let adjustment = (estimate - nearer.value).abs();
        let magnitude = if adjustment == 0.0 {
            0.0
        } else if farther.value == 0.0 {
            f64::INFINITY
        } else {
            adjustment / farther.value.abs()
        };
        let accepted = magnitude <= request.bound_for(mode);

        AlignmentResult {
            value: if accepted { estimate.max(0.0) } else { estimate },
            correction_magnitude: match mode {
                AlignmentMode::Extrapolation => -magnitude,
                _ => magnitude,
            },
            mode,
            accepted,
        }
    }

    /// Like [`Aligner::align`] but turns a rejection into
    /// [`EngineError::UnreliableCorrection`].
    pub fn checked(&self, index: &SeriesIndex, request: &AlignmentRequest) -> Result<AlignmentResult> {
        let result = self.align(index, request);
        if result.accepted {
            return Ok(result);
        }
        Err(EngineError::UnreliableCorrection {
            entity: index.entity().to_string(),
            date: request.target,
            magnitude: result.correction_magnitude,
            bound: request.bound_for(result.mode),
        })
    }

    /// Accepted value at the request's target date.
    pub fn estimate(&self, index: &SeriesIndex, request: &AlignmentRequest) -> Result<f64> {
        self.checked(index, request).map(|result| result.value)
    }
}
