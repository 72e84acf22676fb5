//! Core types for aligning heterogeneously sampled regional time series.
//!
//! Everything here is pure: records are built once per ingestion batch and
//! only read afterwards.

pub mod calendar;
pub mod date_range;
pub mod error;
pub mod period;
pub mod region;
pub mod sample;
pub mod series;

pub use error::{EngineError, Result};
