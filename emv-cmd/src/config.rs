//! Analysis configuration: JSON file defaults plus command-line overrides.

use crate::output::OutputFormat;
use anyhow::Context;
use chrono::{NaiveDate, TimeDelta};
use clap::Args;
use emv_core::calendar::BusinessCalendar;
use emv_core::period::TargetPeriod;
use emv_core::region::{NamingConvention, RegionNormalizer};
use emv_data::{Aligner, AlignmentRequest, EntityPool};
use emv_utils::dates::parse_date;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Tunable parameters of every analysis. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Largest accepted interpolation correction, relative to the farther sample
    pub interpolate_bound: f64,
    /// Largest accepted extrapolation correction
    pub extrapolate_bound: f64,
    /// Days between infection and death
    pub disease_period_days: i64,
    /// Days between vaccination and its appearance in the reports
    pub reporting_delay_days: i64,
    /// Reference years for baselines are all years up to and including this one
    pub baseline_last_year: i32,
    /// Previous-year deaths at or below this are too few to compare against
    pub min_baseline: f64,
    /// Bucketed ratios at or below this are reporting artefacts
    pub min_ratio: f64,
    /// Number of entities reported by the monthly excess analysis
    pub top_entities: usize,
    pub workers: Option<usize>,
    pub calendar: BusinessCalendar,
    pub convention: NamingConvention,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            interpolate_bound: 0.1,
            extrapolate_bound: 0.05,
            disease_period_days: 10,
            reporting_delay_days: 5,
            baseline_last_year: 2019,
            min_baseline: 1000.0,
            min_ratio: 0.3,
            top_entities: 10,
            workers: None,
            calendar: BusinessCalendar::default(),
            convention: NamingConvention::Russia,
        }
    }
}

impl AnalysisConfig {
    /// Read a JSON config file, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: AnalysisConfig = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Date whose vaccination level is compared with deaths in the month
    /// starting at `month_start`.
    pub fn border_date(&self, month_start: NaiveDate) -> NaiveDate {
        month_start + TimeDelta::days(self.reporting_delay_days - self.disease_period_days)
    }

    pub fn alignment_request(&self, target: NaiveDate) -> emv_core::Result<AlignmentRequest> {
        AlignmentRequest::new(target, self.interpolate_bound, self.extrapolate_bound)
    }

    pub fn aligner(&self) -> Aligner {
        Aligner::new(self.calendar.clone())
    }

    pub fn normalizer(&self) -> anyhow::Result<RegionNormalizer> {
        Ok(RegionNormalizer::for_convention(self.convention)?)
    }

    pub fn pool(&self) -> anyhow::Result<EntityPool> {
        EntityPool::new(self.workers).context("failed to build worker pool")
    }
}

/// Options shared by the analysis subcommands.
#[derive(Args, Debug, Clone)]
pub struct AnalysisArgs {
    /// Path to the SQLite record cache
    #[arg(long, default_value = "emv-cache.sqlite")]
    pub db: PathBuf,

    /// JSON file with analysis parameters
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the interpolation trust bound
    #[arg(long)]
    pub interpolate_bound: Option<f64>,

    /// Override the extrapolation trust bound
    #[arg(long)]
    pub extrapolate_bound: Option<f64>,

    /// Number of worker threads (defaults to the available cores)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    pub format: OutputFormat,

    /// Output path (stdout when omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl AnalysisArgs {
    /// Load the config file and apply command-line overrides.
    pub fn config(&self) -> anyhow::Result<AnalysisConfig> {
        let mut config = AnalysisConfig::load(self.config.as_deref())?;
        if let Some(bound) = self.interpolate_bound {
            config.interpolate_bound = bound;
        }
        if let Some(bound) = self.extrapolate_bound {
            config.extrapolate_bound = bound;
        }
        if self.workers.is_some() {
            config.workers = self.workers;
        }
        Ok(config)
    }
}

/// Parse a "YYYY-MM" month argument.
pub fn parse_month(s: &str) -> anyhow::Result<TargetPeriod> {
    let start = parse_date(&format!("{}-01", s.trim()))?;
    Ok(TargetPeriod::month_of(start))
}
