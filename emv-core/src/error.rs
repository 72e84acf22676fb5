/// Error types for the alignment engine
use chrono::NaiveDate;
use thiserror::Error;

/// Main error type for engine operations.
///
/// The first three variants are per-entity outcomes that callers recover from
/// by omitting the entity. The parsing variants are batch-level and fatal.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Interpolated or extrapolated estimate moved too far from the nearer sample
    #[error("Unreliable correction for {entity} at {date}: magnitude {magnitude:.4} exceeds bound {bound}")]
    UnreliableCorrection {
        entity: String,
        date: NaiveDate,
        magnitude: f64,
        bound: f64,
    },

    /// Raw name classified as a non-comparable aggregate
    #[error("Excluded entity: {0}")]
    ExcludedEntity(String),

    /// Ratio denominator was zero or negative
    #[error("Non-positive baseline {baseline} for {entity}")]
    NonPositiveBaseline { entity: String, baseline: f64 },

    /// A date field could not be parsed
    #[error("Failed to parse date: {0}")]
    MalformedDate(String),

    /// A numeric or structural field could not be parsed
    #[error("Unparsable record at row {row}: {reason}")]
    UnparsableRecord { row: usize, reason: String },

    /// A series index was constructed without any samples
    #[error("Series for {0} has no samples")]
    EmptySeries(String),

    /// Period end does not follow its start
    #[error("Invalid period: {start} .. {end}")]
    InvalidPeriod { start: NaiveDate, end: NaiveDate },

    /// A trust bound outside (0, 1)
    #[error("Bound must lie in (0, 1), got {0}")]
    InvalidBound(f64),
}

impl EngineError {
    /// True for outcomes that only affect one entity and must not abort a batch.
    pub fn is_per_entity(&self) -> bool {
        matches!(
            self,
            EngineError::UnreliableCorrection { .. }
                | EngineError::ExcludedEntity(_)
                | EngineError::NonPositiveBaseline { .. }
                | EngineError::EmptySeries(_)
        )
    }
}

/// Type alias for Results using EngineError
pub type Result<T> = std::result::Result<T, EngineError>;
