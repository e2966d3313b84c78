//! Writes a synthetic single-pixel NDVI record as CSV and Parquet.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{Datelike, NaiveDate};
use clap::Parser;
use parquet::arrow::ArrowWriter;

#[derive(Parser, Debug)]
#[command(about = "Generate a synthetic NDVI observation table")]
struct Args {
    #[arg(long, default_value_t = 2018)]
    first_year: i32,

    #[arg(long, default_value_t = 2021)]
    last_year: i32,

    /// Nominal revisit interval in days
    #[arg(long, default_value_t = 5)]
    revisit: u32,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Output path without extension; `.csv` and `.parquet` are appended
    #[arg(long, default_value = "sample_ndvi")]
    output: PathBuf,
}

struct Row {
    date: NaiveDate,
    ndvi: Option<f64>,
    cp: Option<f64>,
}

/// Double-logistic green-up / senescence curve for one season.
fn seasonal_ndvi(day_of_year: f64, green_up: f64, senescence: f64) -> f64 {
    let base = 0.18;
    let peak = 0.78;
    let rise = 1.0 / (1.0 + (-(day_of_year - green_up) / 9.0).exp());
    let fall = 1.0 / (1.0 + ((day_of_year - senescence) / 12.0).exp());
    base + (peak - base) * (rise + fall - 1.0).max(0.0)
}

/// Minimal deterministic PRNG (xoshiro256**), seeded with splitmix64.
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut x = seed;
        let mut state = [0u64; 4];
        for slot in &mut state {
            x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
            let mut z = x;
            z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
            *slot = z ^ (z >> 31);
        }
        SimpleRng { state }
    }

    fn next_u64(&mut self) -> u64 {
        let s = &mut self.state;
        let result = s[1].wrapping_mul(5).rotate_left(7).wrapping_mul(9);
        let t = s[1] << 17;
        s[2] ^= s[0];
        s[3] ^= s[1];
        s[1] ^= s[2];
        s[0] ^= s[3];
        s[2] ^= t;
        s[3] = s[3].rotate_left(45);
        result
    }

    /// Uniform in [0, 1).
    fn uniform(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.uniform().max(1e-15);
        let u2 = self.uniform();
        mean + std_dev * (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
    }
}

fn generate(args: &Args) -> Result<Vec<Row>> {
    if args.last_year < args.first_year {
        bail!("--last-year must not precede --first-year");
    }
    if args.revisit == 0 {
        bail!("--revisit must be at least one day");
    }
    let start = NaiveDate::from_ymd_opt(args.first_year, 1, 1).context("invalid first year")?;
    let end = NaiveDate::from_ymd_opt(args.last_year, 12, 31).context("invalid last year")?;

    let mut rng = SimpleRng::new(args.seed);
    let mut rows = Vec::new();
    let mut season = (0, 0.0, 0.0);

    let mut date = start + chrono::Duration::days((rng.uniform() * args.revisit as f64) as i64);
    while date <= end {
        if season.0 != date.year() {
            season = (date.year(), rng.gauss(110.0, 8.0), rng.gauss(265.0, 10.0));
        }
        let clean = seasonal_ndvi(date.ordinal() as f64, season.1, season.2) + rng.gauss(0.0, 0.02);

        let roll = rng.uniform();
        let row = if roll < 0.25 {
            // Cloud contamination depresses NDVI.
            let cp = 0.05 + 0.95 * rng.uniform();
            Row { date, ndvi: Some(clean * (1.0 - 0.8 * cp)), cp: Some(cp) }
        } else if roll < 0.28 {
            // Residual haze missed by the cloud mask.
            Row { date, ndvi: Some(clean - 0.25 - 0.1 * rng.uniform()), cp: Some(0.0) }
        } else if roll < 0.30 {
            Row { date, ndvi: None, cp: Some(0.0) }
        } else if roll < 0.31 {
            Row { date, ndvi: Some(clean), cp: None }
        } else {
            Row { date, ndvi: Some(clean), cp: Some(0.0) }
        };
        rows.push(row);

        date += chrono::Duration::days(args.revisit as i64);
    }
    Ok(rows)
}

fn write_csv(rows: &[Row], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(["timestamp", "ndvi", "cp"])?;
    let cell = |v: Option<f64>| v.map_or_else(String::new, |v| format!("{v:.4}"));
    for row in rows {
        writer.write_record([row.date.format("%d-%m-%Y").to_string(), cell(row.ndvi), cell(row.cp)])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_parquet(rows: &[Row], path: &Path) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("timestamp", DataType::Utf8, false),
        Field::new("ndvi", DataType::Float64, true),
        Field::new("cp", DataType::Float64, true),
    ]));

    let timestamps: Vec<String> = rows.iter().map(|r| r.date.format("%d-%m-%Y").to_string()).collect();
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from(timestamps)),
            Arc::new(rows.iter().map(|r| r.ndvi).collect::<Float64Array>()),
            Arc::new(rows.iter().map(|r| r.cp).collect::<Float64Array>()),
        ],
    )
    .context("building record batch")?;

    let file = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let rows = generate(&args)?;

    let csv_path = args.output.with_extension("csv");
    let parquet_path = args.output.with_extension("parquet");
    write_csv(&rows, &csv_path)?;
    write_parquet(&rows, &parquet_path)?;

    println!(
        "Wrote {} observations ({}..={}) to {} and {}",
        rows.len(),
        args.first_year,
        args.last_year,
        csv_path.display(),
        parquet_path.display()
    );
    Ok(())
}
