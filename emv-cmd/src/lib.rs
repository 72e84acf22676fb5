//! Command implementations for EMV CLI.
//!
//! Provides subcommands for importing statistics into the record cache and
//! for the three analyses built on the alignment engine.

use clap::Subcommand;
use emv_core::region::{Normalized, RegionKey, RegionNormalizer};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

pub mod config;
pub mod excess;
pub mod import;
pub mod output;
pub mod vaccination;
pub mod weekly;

use config::{parse_month, AnalysisArgs};

#[derive(Subcommand)]
pub enum Command {
    /// Load a downloaded table into the record cache
    Import {
        /// Kind of table
        #[arg(value_enum)]
        source: import::Source,

        /// Table file, or directory for region tables
        path: PathBuf,

        /// Path to the SQLite record cache
        #[arg(long, default_value = "emv-cache.sqlite")]
        db: PathBuf,

        /// Target month ("YYYY-MM") of a comparison table
        #[arg(long)]
        period: Option<String>,

        /// Newest date of region tables, used to infer years (defaults to today)
        #[arg(long, value_parser = parse_reference)]
        reference: Option<chrono::NaiveDate>,

        /// `Type` value of weekly death estimates to keep
        #[arg(long, default_value = "Predicted (weighted)")]
        processing: String,
    },

    /// Export cached vaccination rows as CSV
    Export {
        /// Path to the SQLite record cache
        #[arg(long, default_value = "emv-cache.sqlite")]
        db: PathBuf,

        /// Output path (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Monthly excess mortality of the largest regions
    Excess {
        #[command(flatten)]
        args: AnalysisArgs,
    },

    /// Regional vaccination level against monthly excess mortality
    Vaccination {
        /// Target months ("YYYY-MM")
        #[arg(required = true)]
        months: Vec<String>,

        #[command(flatten)]
        args: AnalysisArgs,
    },

    /// Weekly deaths by age cohort against vaccination coverage
    Weekly {
        /// Target months ("YYYY-MM")
        #[arg(required = true)]
        months: Vec<String>,

        #[command(flatten)]
        args: AnalysisArgs,
    },
}

fn parse_reference(s: &str) -> Result<chrono::NaiveDate, String> {
    emv_utils::dates::parse_date(s).map_err(|e| e.to_string())
}

fn parse_months(months: &[String]) -> anyhow::Result<Vec<emv_core::period::TargetPeriod>> {
    months.iter().map(|m| parse_month(m)).collect()
}

pub fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Import {
            source,
            path,
            db,
            period,
            reference,
            processing,
        } => import::run_import(&db, source, &path, period.as_deref(), reference, &processing),
        Command::Export { db, output } => import::run_export(&db, output.as_deref()),
        Command::Excess { args } => excess::run_excess(&args),
        Command::Vaccination { months, args } => {
            vaccination::run_vaccination(&args, &parse_months(&months)?)
        }
        Command::Weekly { months, args } => weekly::run_weekly(&args, &parse_months(&months)?),
    }
}

/// Group raw-named items under their canonical keys, dropping excluded names.
pub(crate) fn group_by_key<T>(
    normalizer: &RegionNormalizer,
    items: impl IntoIterator<Item = (String, T)>,
) -> BTreeMap<RegionKey, Vec<T>> {
    let mut grouped: BTreeMap<RegionKey, Vec<T>> = BTreeMap::new();
    let mut excluded = BTreeSet::new();
    for (raw, item) in items {
        match normalizer.normalize(&raw) {
            Normalized::Key(key) => grouped.entry(key).or_default().push(item),
            Normalized::Excluded => {
                if excluded.insert(raw.clone()) {
                    log::debug!("Excluded {raw:?}");
                }
            }
        }
    }
    if !excluded.is_empty() {
        log::info!("Grouped {} entities, excluded {} names", grouped.len(), excluded.len());
    }
    grouped
}
