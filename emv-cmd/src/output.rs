//! Writing result rows as CSV or JSON.

use anyhow::Context;
use clap::ValueEnum;
use serde::Serialize;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

/// Serialize `rows` to `writer`. Rows must be flat for CSV.
pub fn write_rows<T: Serialize, W: Write>(rows: &[T], format: OutputFormat, writer: W) -> anyhow::Result<()> {
    match format {
        OutputFormat::Csv => {
            let mut wtr = csv::Writer::from_writer(writer);
            for row in rows {
                wtr.serialize(row)?;
            }
            wtr.flush()?;
        }
        OutputFormat::Json => {
            let mut writer = writer;
            serde_json::to_writer_pretty(&mut writer, rows)?;
            writeln!(writer)?;
        }
    }
    Ok(())
}

/// Write rows to `output`, or stdout when no path is given.
pub fn emit<T: Serialize>(rows: &[T], format: OutputFormat, output: Option<&Path>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
            write_rows(rows, format, file)?;
            log::info!("Wrote {} rows to {}", rows.len(), path.display());
        }
        None => write_rows(rows, format, io::stdout().lock())?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        region: String,
        ratio: f64,
    }

    fn rows() -> Vec<Row> {
        vec![
            Row {
                region: "Тверская".into(),
                ratio: 1.25,
            },
            Row {
                region: "NY".into(),
                ratio: 0.5,
            },
        ]
    }

    #[test]
    fn test_csv_output() {
        let mut buf = Vec::new();
        write_rows(&rows(), OutputFormat::Csv, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "region,ratio\nТверская,1.25\nNY,0.5\n");
    }

    #[test]
    fn test_json_output() {
        let mut buf = Vec::new();
        write_rows(&rows(), OutputFormat::Json, &mut buf).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value[1]["region"], "NY");
        assert_eq!(value[0]["ratio"], 1.25);
    }
}
