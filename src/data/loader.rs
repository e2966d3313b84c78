use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{
    Array, AsArray, Date32Array, Date64Array, Float32Array, Float64Array, StringArray,
};
use arrow::datatypes::DataType;
use chrono::NaiveDate;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::calendar::parse_dmy;
use super::model::Observation;

pub const TIMESTAMP_COLUMN: &str = "timestamp";
pub const NDVI_COLUMN: &str = "ndvi";
pub const CLOUD_COLUMN: &str = "cp";

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load observations from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row with `timestamp`, `ndvi`, `cp` columns
/// * `.json`    – `[{ "timestamp": "05-07-2020", "ndvi": 0.61, "cp": 0.0 }, ...]`
/// * `.parquet` – `timestamp` as text or Date32/Date64, `ndvi`/`cp` as floats
///
/// Rows whose timestamp cannot be parsed are skipped. An input with no usable
/// rows is an error.
pub fn load_file(path: &Path) -> Result<Vec<Observation>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let loaded = match ext.as_str() {
        "csv" | "txt" => load_csv(path),
        "json" => load_json(path),
        "parquet" | "pq" => load_parquet(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
    .with_context(|| format!("loading {}", path.display()))?;

    if loaded.rows == 0 {
        bail!("{} contains no observations", path.display());
    }
    if loaded.skipped > 0 {
        log::warn!(
            "Skipped {} of {} rows with an unreadable timestamp",
            loaded.skipped,
            loaded.rows
        );
    }
    if loaded.observations.is_empty() {
        bail!(
            "{} has {} rows but none with a valid day-month-year timestamp",
            path.display(),
            loaded.rows
        );
    }
    Ok(loaded.observations)
}

#[derive(Debug, Default)]
struct Loaded {
    observations: Vec<Observation>,
    rows: usize,
    skipped: usize,
}

impl Loaded {
    fn push(&mut self, row: usize, date: Option<NaiveDate>, ndvi: Option<f64>, cp: Option<f64>) {
        self.rows += 1;
        match date {
            Some(date) => self.observations.push(Observation::new(date, ndvi, cp)),
            None => {
                log::debug!("Row {row}: unreadable timestamp");
                self.skipped += 1;
            }
        }
    }
}

/// Parse a numeric cell; empty, `NA`, `NaN` or unparseable text is missing.
fn parse_value(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names (matched case-insensitively).
/// Extra columns are ignored.
fn load_csv(path: &Path) -> Result<Loaded> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .with_context(|| format!("CSV missing '{name}' column"))
    };
    let ts_idx = find(TIMESTAMP_COLUMN)?;
    let ndvi_idx = find(NDVI_COLUMN)?;
    let cp_idx = find(CLOUD_COLUMN)?;

    let mut loaded = Loaded::default();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let date = record.get(ts_idx).and_then(parse_dmy);
        let ndvi = record.get(ndvi_idx).and_then(parse_value);
        let cp = record.get(cp_idx).and_then(parse_value);
        loaded.push(row_no, date, ndvi, cp);
    }
    Ok(loaded)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented):
///
/// ```json
/// [
///   { "timestamp": "05-07-2020", "ndvi": 0.61, "cp": 0.0 },
///   { "timestamp": "10-07-2020", "ndvi": null, "cp": "0.7" },
///   ...
/// ]
/// ```
fn load_json(path: &Path) -> Result<Loaded> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root
        .as_array()
        .context("Expected top-level JSON array")?;

    let mut loaded = Loaded::default();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        let date = obj
            .get(TIMESTAMP_COLUMN)
            .and_then(|v| v.as_str())
            .and_then(parse_dmy);
        let ndvi = obj.get(NDVI_COLUMN).and_then(json_to_f64);
        let cp = obj.get(CLOUD_COLUMN).and_then(json_to_f64);
        loaded.push(i, date, ndvi, cp);
    }
    Ok(loaded)
}

fn json_to_f64(val: &JsonValue) -> Option<f64> {
    match val {
        JsonValue::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        JsonValue::String(s) => parse_value(s),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file of observations.
///
/// Expected schema:
/// - `timestamp`: Utf8/LargeUtf8 (day-month-year text), Date32 or Date64
/// - `ndvi`, `cp`: Float64 or Float32, nullable
fn load_parquet(path: &Path) -> Result<Loaded> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut loaded = Loaded::default();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        let column = |name: &str| {
            schema
                .index_of(name)
                .map(|idx| batch.column(idx))
                .map_err(|_| anyhow::anyhow!("Parquet file missing '{name}' column"))
        };
        let ts_col = column(TIMESTAMP_COLUMN)?;
        let ndvi_col = column(NDVI_COLUMN)?;
        let cp_col = column(CLOUD_COLUMN)?;

        let row_offset = loaded.rows;
        for row in 0..batch.num_rows() {
            let date = extract_date(ts_col, row)
                .with_context(|| format!("Row {}: failed to read '{TIMESTAMP_COLUMN}'", row_offset + row))?;
            let ndvi = extract_f64(ndvi_col, row)
                .with_context(|| format!("Row {}: failed to read '{NDVI_COLUMN}'", row_offset + row))?;
            let cp = extract_f64(cp_col, row)
                .with_context(|| format!("Row {}: failed to read '{CLOUD_COLUMN}'", row_offset + row))?;
            loaded.push(row_offset + row, date, ndvi, cp);
        }
    }

    Ok(loaded)
}

// -- Parquet / Arrow helpers --

fn epoch_days_to_date(days: i64) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1970, 1, 1)?.checked_add_signed(chrono::Duration::days(days))
}

/// Read the timestamp cell at `row`. `Ok(None)` for nulls and unparseable
/// text; `Err` only for a column type that cannot hold dates.
fn extract_date(col: &Arc<dyn Array>, row: usize) -> Result<Option<NaiveDate>> {
    if col.is_null(row) {
        return Ok(None);
    }
    let date = match col.data_type() {
        DataType::Utf8 => {
            let arr = col
                .as_any()
                .downcast_ref::<StringArray>()
                .context("expected StringArray")?;
            parse_dmy(arr.value(row))
        }
        DataType::LargeUtf8 => parse_dmy(col.as_string::<i64>().value(row)),
        DataType::Date32 => {
            let arr = col
                .as_any()
                .downcast_ref::<Date32Array>()
                .context("expected Date32Array")?;
            epoch_days_to_date(arr.value(row) as i64)
        }
        DataType::Date64 => {
            let arr = col
                .as_any()
                .downcast_ref::<Date64Array>()
                .context("expected Date64Array")?;
            epoch_days_to_date(arr.value(row).div_euclid(86_400_000))
        }
        other => bail!("Expected a text or date column, got {other:?}"),
    };
    Ok(date)
}

/// Read a float cell at `row`; nulls and non-finite values are missing.
fn extract_f64(col: &Arc<dyn Array>, row: usize) -> Result<Option<f64>> {
    if col.is_null(row) {
        return Ok(None);
    }
    let value = if let Some(arr) = col.as_any().downcast_ref::<Float64Array>() {
        arr.value(row)
    } else if let Some(arr) = col.as_any().downcast_ref::<Float32Array>() {
        arr.value(row) as f64
    } else {
        bail!("Expected Float64 or Float32 column, got {:?}", col.data_type())
    };
    Ok(Some(value).filter(|v| v.is_finite()))
}
