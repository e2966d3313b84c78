use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use chrono::{Datelike, NaiveDate};
use thiserror::Error;

use crate::config::PipelineConfig;
use crate::data::filter::clean_observations;
use crate::data::loader::load_file;
use crate::data::model::{
    Analysis, CleanedObservation, DailyRecord, DailyTable, Observation, SampleSeries,
};
use crate::data::scaffold::{ScaffoldDay, daily_scaffold, loess_span};
use crate::smooth::{Smoother, run_smoothers};

/// Conditions under which a run produces no output at all.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("the input contains no observations")]
    EmptyInput,

    #[error(
        "no usable samples remain: {total} observations, {bad} above the cloud threshold, \
         {outliers} weekly outliers"
    )]
    NoCleanSamples {
        total: usize,
        bad: usize,
        outliers: usize,
    },

    #[error("invalid settings: {0}")]
    InvalidConfig(String),

    #[error("cannot build the daily grid: {0}")]
    Scaffold(String),
}

/// Load a file and run the full pipeline on it.
pub fn run_file(path: &Path, config: &PipelineConfig) -> anyhow::Result<Analysis> {
    let observations = load_file(path)?;
    log::info!("Loaded {} observations from {}", observations.len(), path.display());
    run(observations, config).with_context(|| format!("processing {}", path.display()))
}

/// Clean, scaffold, smooth and join `observations` into a daily table.
pub fn run(observations: Vec<Observation>, config: &PipelineConfig) -> Result<Analysis, PipelineError> {
    if observations.is_empty() {
        return Err(PipelineError::EmptyInput);
    }
    config
        .validate()
        .map_err(|e| PipelineError::InvalidConfig(format!("{e:#}")))?;

    let cleaned = clean_observations(&observations, config);
    let samples = SampleSeries::from_cleaned(&cleaned);
    if samples.is_empty() {
        return Err(PipelineError::NoCleanSamples {
            total: cleaned.len(),
            bad: cleaned.iter().filter(|c| !c.quality.is_good()).count(),
            outliers: cleaned.iter().filter(|c| c.outlier).count(),
        });
    }

    // Non-empty input, so both ends exist.
    let (start_year, end_year) = cleaned
        .iter()
        .map(|c| c.date().year())
        .fold((i32::MAX, i32::MIN), |(lo, hi), y| (lo.min(y), hi.max(y)));
    let scaffold = daily_scaffold(start_year, end_year)
        .map_err(|e| PipelineError::Scaffold(format!("{e:#}")))?;

    if let Some((first, last)) = samples.range() {
        log::debug!("{} clean samples between {first:.4} and {last:.4}", samples.len());
    }

    let span = loess_span(&scaffold, config.loess.window_intervals);
    log::debug!("LOESS span over {} days: {span:?}", scaffold.len());

    let grid: Vec<f64> = scaffold.iter().map(|d| d.decimal_year).collect();
    let outputs = run_smoothers(&samples, &grid, span, config);

    let mut records = join_raw(&scaffold, &cleaned);
    for (smoother, column) in &outputs.columns {
        for (record, value) in records.iter_mut().zip(column) {
            record.set_smoothed(*smoother, *value);
        }
    }

    let daily = DailyTable {
        records,
        status: outputs.status,
    };
    log::info!(
        "Pipeline: {} samples over {start_year}..={end_year}, {} days, {}/{} smoothers ok",
        samples.len(),
        daily.len(),
        daily.status.values().filter(|s| s.is_ok()).count(),
        Smoother::ALL.len()
    );

    Ok(Analysis {
        observations: cleaned,
        samples,
        daily,
        loess_span: span,
        start_year,
        end_year,
    })
}

/// Per-date aggregate of the raw and cleaned observations.
#[derive(Default)]
struct DayObservations {
    first: Option<(Option<f64>, Option<f64>)>,
    count: usize,
    clean_sum: f64,
    clean_count: usize,
}

/// Attach raw observations to the grid. A day with several observations
/// keeps the first raw values in input order and the mean cleaned value.
fn join_raw(scaffold: &[ScaffoldDay], cleaned: &[CleanedObservation]) -> Vec<DailyRecord> {
    let mut by_date: BTreeMap<NaiveDate, DayObservations> = BTreeMap::new();
    for c in cleaned {
        let day = by_date.entry(c.date()).or_default();
        day.first
            .get_or_insert((c.observation.ndvi, c.observation.cloud_probability));
        day.count += 1;
        if let Some(v) = c.ndvi {
            day.clean_sum += v;
            day.clean_count += 1;
        }
    }

    scaffold
        .iter()
        .map(|d| {
            let day = by_date.get(&d.date);
            let (ndvi, cloud_probability) = day.and_then(|o| o.first).unwrap_or((None, None));
            DailyRecord {
                date: d.date,
                decimal_year: d.decimal_year,
                ndvi,
                cloud_probability,
                observation_count: day.map_or(0, |o| o.count),
                ndvi_clean: day
                    .filter(|o| o.clean_count > 0)
                    .map(|o| o.clean_sum / o.clean_count as f64),
                savgol: None,
                spline: None,
                loess: None,
                linear: None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smooth::SmootherStatus;
    use approx::assert_abs_diff_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn obs(d: NaiveDate, ndvi: f64, cp: f64) -> Observation {
        Observation::new(d, Some(ndvi), Some(cp))
    }

    /// Two seasons sampled every five days with a deterministic wobble.
    fn seasonal() -> Vec<Observation> {
        date(2020, 1, 3)
            .iter_days()
            .step_by(5)
            .take_while(|d| d.year() < 2022)
            .enumerate()
            .map(|(i, d)| {
                let t = crate::data::calendar::decimal_year(d);
                let wobble = [0.01, -0.02, 0.015, 0.0, -0.005][i % 5];
                let cp = if i % 7 == 3 { 0.4 } else { 0.0 };
                obs(d, 0.45 + 0.3 * (std::f64::consts::TAU * (t - 0.3)).sin() + wobble, cp)
            })
            .collect()
    }

    fn record(a: &Analysis, d: NaiveDate) -> &DailyRecord {
        a.daily.records.iter().find(|r| r.date == d).unwrap()
    }

    #[test]
    fn test_empty_input_is_fatal() {
        assert_eq!(
            run(Vec::new(), &PipelineConfig::default()).unwrap_err(),
            PipelineError::EmptyInput
        );
    }

    #[test]
    fn test_all_cloudy_is_fatal() {
        let input = vec![obs(date(2020, 5, 1), 0.5, 0.3), obs(date(2020, 5, 6), 0.6, 0.01)];
        assert_eq!(
            run(input, &PipelineConfig::default()).unwrap_err(),
            PipelineError::NoCleanSamples {
                total: 2,
                bad: 2,
                outliers: 0
            }
        );
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let mut config = PipelineConfig::default();
        config.loess.degree = 5;
        let err = run(seasonal(), &config).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }

    #[test]
    fn test_two_samples_interpolate_linearly() {
        let input = vec![obs(date(2020, 1, 1), 0.30, 0.0), obs(date(2020, 1, 11), 0.50, 0.0)];
        let a = run(input.clone(), &PipelineConfig::default()).unwrap();

        assert_eq!(a.daily.len(), 366);
        assert_abs_diff_eq!(record(&a, date(2020, 1, 6)).linear.unwrap(), 0.40, epsilon = 1e-9);
        assert!(record(&a, date(2020, 1, 12)).linear.is_none());
        assert!(matches!(
            a.daily.status[&Smoother::SavitzkyGolay],
            SmootherStatus::Failed(_)
        ));
        assert!(a.daily.records.iter().all(|r| r.savgol.is_none()));

        let again = run(input, &PipelineConfig::default()).unwrap();
        assert_eq!(a, again);
    }

    #[test]
    fn test_scaffold_covers_whole_years() {
        let a = run(seasonal(), &PipelineConfig::default()).unwrap();
        assert_eq!((a.start_year, a.end_year), (2020, 2021));
        assert_eq!(a.daily.len(), 366 + 365);
        assert_eq!(a.daily.records[0].date, date(2020, 1, 1));
        assert_eq!(a.daily.records[a.daily.len() - 1].date, date(2021, 12, 31));
        for w in a.daily.records.windows(2) {
            assert_eq!(w[1].date, w[0].date.succ_opt().unwrap());
        }
    }

    #[test]
    fn test_smoother_coverage_at_the_edges() {
        let a = run(seasonal(), &PipelineConfig::default()).unwrap();
        assert!(a.daily.status.values().all(SmootherStatus::is_ok));

        let (lo, hi) = a.samples.range().unwrap();
        for r in &a.daily.records {
            if r.decimal_year < lo || r.decimal_year > hi {
                assert!(r.linear.is_none(), "linear at {}", r.date);
                assert!(r.savgol.is_none(), "savgol at {}", r.date);
                assert!(r.loess.is_none(), "loess at {}", r.date);
            } else {
                assert!(r.linear.is_some(), "no linear at {}", r.date);
            }
        }
        let first = &a.daily.records[0];
        let last = &a.daily.records[a.daily.len() - 1];
        assert!(first.spline.is_some() && last.spline.is_some());
    }

    #[test]
    fn test_cloudy_days_keep_raw_values_only() {
        let a = run(seasonal(), &PipelineConfig::default()).unwrap();
        let cloudy = a
            .observations
            .iter()
            .find(|c| !c.quality.is_good())
            .unwrap();
        let r = record(&a, cloudy.date());
        assert_eq!(r.ndvi, cloudy.observation.ndvi);
        assert_eq!(r.cloud_probability, Some(0.4));
        assert_eq!(r.observation_count, 1);
        assert!(r.ndvi_clean.is_none());
        assert_eq!(a.bad_count(), a.observations.len() - a.samples.len() - a.outlier_count());
    }

    #[test]
    fn test_same_day_observations() {
        let d = date(2020, 3, 10);
        let input = vec![
            obs(date(2020, 3, 1), 0.2, 0.0),
            obs(d, 0.4, 0.0),
            Observation::new(d, Some(0.9), Some(0.8)),
            obs(d, 0.6, 0.0),
            obs(date(2020, 3, 20), 0.3, 0.0),
        ];
        let a = run(input, &PipelineConfig::default()).unwrap();
        let r = record(&a, d);
        assert_eq!(r.ndvi, Some(0.4));
        assert_eq!(r.observation_count, 3);
        assert_abs_diff_eq!(r.ndvi_clean.unwrap(), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(r.linear.unwrap(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_run_file() {
        use std::io::Write;
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "timestamp,ndvi,cp").unwrap();
        writeln!(file, "01-01-2020,0.30,0.0").unwrap();
        writeln!(file, "11-01-2020,0.50,0.0").unwrap();
        let a = run_file(file.path(), &PipelineConfig::default()).unwrap();
        assert_abs_diff_eq!(record(&a, date(2020, 1, 6)).linear.unwrap(), 0.40, epsilon = 1e-9);
    }
}
