//! Attribution of bucketed totals to target periods by calendar-day overlap.

use emv_core::period::{PeriodBucket, TargetPeriod};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ApportionmentResult {
    pub attributed_total: f64,
    pub overlap_days: i64,
    pub bucket_days: i64,
}

/// Share of `bucket.total` falling inside `period`, proportional to the
/// number of overlapping calendar days.
///
/// A bucket wholly inside the period contributes its exact total. Partial
/// shares are rounded half away from zero.
pub fn apportion(bucket: &PeriodBucket, period: &TargetPeriod) -> ApportionmentResult {
    let bucket_days = bucket.num_days();
    let overlap_days = bucket.as_range().intersect(&period.as_range()).num_days();

    let attributed_total = if overlap_days <= 0 || bucket_days <= 0 {
        0.0
    } else if overlap_days == bucket_days {
        bucket.total
    } else {
        (bucket.total * overlap_days as f64 / bucket_days as f64).round()
    };

    ApportionmentResult {
        attributed_total,
        overlap_days,
        bucket_days,
    }
}

/// Sum of the apportioned shares of every bucket overlapping `period`.
///
/// `None` when no bucket touches the period, so that "no data" stays
/// distinct from a genuine zero.
pub fn period_total<'a, I>(buckets: I, period: &TargetPeriod) -> Option<f64>
where
    I: IntoIterator<Item = &'a PeriodBucket>,
{
    buckets
        .into_iter()
        .filter(|bucket| bucket.overlaps(period))
        .map(|bucket| apportion(bucket, period).attributed_total)
        .fold(None, |sum, share| Some(sum.unwrap_or(0.0) + share))
}
