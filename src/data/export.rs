use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;

use super::model::{DailyRecord, DailyTable};

/// One row of the exported daily table. `None` is written as an empty cell.
#[derive(Debug, Serialize)]
struct ExportRow {
    date: NaiveDate,
    decimal_year: f64,
    ndvi: Option<f64>,
    cp: Option<f64>,
    n_obs: usize,
    ndvi_clean: Option<f64>,
    savgol: Option<f64>,
    spline: Option<f64>,
    loess: Option<f64>,
    linear: Option<f64>,
}

impl From<&DailyRecord> for ExportRow {
    fn from(r: &DailyRecord) -> Self {
        ExportRow {
            date: r.date,
            decimal_year: r.decimal_year,
            ndvi: r.ndvi,
            cp: r.cloud_probability,
            n_obs: r.observation_count,
            ndvi_clean: r.ndvi_clean,
            savgol: r.savgol,
            spline: r.spline,
            loess: r.loess,
            linear: r.linear,
        }
    }
}

/// Write the daily table as CSV with a header row.
pub fn write_daily_csv<W: Write>(table: &DailyTable, out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    for record in &table.records {
        writer
            .serialize(ExportRow::from(record))
            .with_context(|| format!("writing row for {}", record.date))?;
    }
    writer.flush().context("flushing CSV output")?;
    Ok(())
}

pub fn export_daily_csv(table: &DailyTable, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    write_daily_csv(table, file)?;
    log::info!("Exported {} days to {}", table.len(), path.display());
    Ok(())
}
