use std::collections::BTreeMap;

use super::model::{CleanedObservation, Observation, QualityFlag, WeekBucket};
use crate::config::PipelineConfig;

// ---------------------------------------------------------------------------
// Quality filter
// ---------------------------------------------------------------------------

/// Classify every observation by cloud probability and assign its week
/// bucket. NDVI survives only for `Good` records with a finite value.
pub fn apply_quality_filter(
    observations: &[Observation],
    config: &PipelineConfig,
) -> Vec<CleanedObservation> {
    observations
        .iter()
        .map(|obs| {
            let quality = QualityFlag::classify(obs.cloud_probability, config.cloud_threshold);
            let ndvi = obs
                .ndvi
                .filter(|v| v.is_finite() && quality.is_good());
            let week = config.week_numbering.week(obs.date);
            let year = config
                .year_aware_weeks
                .then(|| config.week_numbering.week_year(obs.date));

            CleanedObservation {
                observation: obs.clone(),
                quality,
                bucket: WeekBucket { year, week },
                outlier: false,
                ndvi,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Box-plot statistics
// ---------------------------------------------------------------------------

/// Tukey's five-number summary: minimum, lower hinge, median, upper hinge,
/// maximum. NaNs must be filtered out by the caller.
pub fn five_number_summary(values: &[f64]) -> Option<[f64; 5]> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    let n4 = ((n + 3) / 2) as f64 / 2.0;
    let depths = [1.0, n4, (n as f64 + 1.0) / 2.0, n as f64 + 1.0 - n4, n as f64];

    // Depths are 1-based and may sit halfway between two order statistics.
    let at = |depth: f64| {
        let lo = sorted[depth.floor() as usize - 1];
        let hi = sorted[depth.ceil() as usize - 1];
        0.5 * (lo + hi)
    };
    Some(depths.map(at))
}

/// Lower and upper whisker limits `hinge ∓ coef·IQR`. A non-positive `coef`
/// disables outlier detection.
pub fn box_plot_fences(values: &[f64], coef: f64) -> Option<(f64, f64)> {
    if coef <= 0.0 {
        return None;
    }
    let stats = five_number_summary(values)?;
    let iqr = stats[3] - stats[1];
    Some((stats[1] - coef * iqr, stats[3] + coef * iqr))
}

// ---------------------------------------------------------------------------
// Weekly outlier removal
// ---------------------------------------------------------------------------

/// Null out box-plot outliers within each week bucket, independently per
/// bucket. Returns the number of values removed.
pub fn remove_weekly_outliers(records: &mut [CleanedObservation], coef: f64) -> usize {
    let mut buckets: BTreeMap<WeekBucket, Vec<usize>> = BTreeMap::new();
    for (idx, rec) in records.iter().enumerate() {
        if rec.ndvi.is_some() {
            buckets.entry(rec.bucket).or_default().push(idx);
        }
    }

    let mut removed = 0;
    for (bucket, members) in &buckets {
        let values: Vec<f64> = members.iter().filter_map(|&i| records[i].ndvi).collect();
        let Some((lower, upper)) = box_plot_fences(&values, coef) else {
            continue;
        };

        let mut bucket_removed = 0;
        for &i in members {
            let rec = &mut records[i];
            if let Some(v) = rec.ndvi {
                if v < lower || v > upper {
                    rec.ndvi = None;
                    rec.outlier = true;
                    bucket_removed += 1;
                }
            }
        }

        if bucket_removed > 0 {
            log::debug!(
                "{bucket}: removed {bucket_removed} of {} values outside [{lower:.4}, {upper:.4}]",
                values.len()
            );
        }
        removed += bucket_removed;
    }
    removed
}

/// Quality filter followed by weekly outlier removal. Every input record is
/// returned, annotated; records without a value are not part of the cleaned
/// sample set.
pub fn clean_observations(
    observations: &[Observation],
    config: &PipelineConfig,
) -> Vec<CleanedObservation> {
    let mut cleaned = apply_quality_filter(observations, config);
    let removed = remove_weekly_outliers(&mut cleaned, config.whisker_coef);
    let bad = cleaned.iter().filter(|c| !c.quality.is_good()).count();
    log::info!(
        "Cleaning: {} observations, {bad} failed the cloud threshold, {removed} weekly outliers",
        cleaned.len()
    );
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::calendar::WeekNumbering;
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn obs(y: i32, m: u32, d: u32, ndvi: f64, cp: f64) -> Observation {
        Observation::new(NaiveDate::from_ymd_opt(y, m, d).unwrap(), Some(ndvi), Some(cp))
    }

    #[test]
    fn test_quality_threshold() {
        let config = PipelineConfig::default();
        let input = vec![
            obs(2020, 3, 2, 0.5, 0.0),
            obs(2020, 3, 3, 0.5, 0.009),
            obs(2020, 3, 4, 0.5, 0.01),
            obs(2020, 3, 5, 0.5, 0.8),
        ];
        let out = apply_quality_filter(&input, &config);
        let kept: Vec<bool> = out.iter().map(|c| c.ndvi.is_some()).collect();
        assert_eq!(kept, vec![true, true, false, false]);
        assert_eq!(out[2].quality, QualityFlag::Bad);
    }

    #[test]
    fn test_missing_or_nan_values_are_bad() {
        let config = PipelineConfig::default();
        let date = NaiveDate::from_ymd_opt(2020, 5, 1).unwrap();
        let input = vec![
            Observation::new(date, Some(0.4), None),
            Observation::new(date, Some(0.4), Some(f64::NAN)),
            Observation::new(date, None, Some(0.0)),
            Observation::new(date, Some(f64::NAN), Some(0.0)),
        ];
        let out = apply_quality_filter(&input, &config);
        assert_eq!(out[0].quality, QualityFlag::Bad);
        assert_eq!(out[1].quality, QualityFlag::Bad);
        assert_eq!(out[2].quality, QualityFlag::Good);
        assert!(out.iter().all(|c| c.ndvi.is_none()));
    }

    #[test]
    fn test_five_number_summary_matches_tukey_hinges() {
        let s = five_number_summary(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(s, [1.0, 1.5, 2.5, 3.5, 4.0]);

        let s = five_number_summary(&[7.0, 1.0, 3.0, 5.0, 9.0]).unwrap();
        assert_eq!(s, [1.0, 3.0, 5.0, 7.0, 9.0]);

        let s = five_number_summary(&[0.42]).unwrap();
        assert_eq!(s, [0.42; 5]);

        assert!(five_number_summary(&[]).is_none());
    }

    #[test]
    fn test_outlier_removed_within_week() {
        let config = PipelineConfig::default();
        // 2020-06-01 .. 2020-06-06 share ISO week 23.
        let mut input: Vec<Observation> = (1..=5)
            .map(|d| obs(2020, 6, d, 0.60 + d as f64 * 0.005, 0.0))
            .collect();
        input.push(obs(2020, 6, 6, 0.05, 0.0));

        let cleaned = clean_observations(&input, &config);
        assert_eq!(cleaned.iter().filter(|c| c.outlier).count(), 1);
        let dropped = cleaned.iter().find(|c| c.outlier).unwrap();
        assert_abs_diff_eq!(dropped.observation.ndvi.unwrap(), 0.05);
        assert!(dropped.ndvi.is_none());
    }

    #[test]
    fn test_small_partitions_pass_through() {
        let config = PipelineConfig::default();
        let input = vec![
            obs(2020, 6, 1, 0.6, 0.0),
            obs(2020, 6, 2, 0.61, 0.0),
            obs(2020, 6, 3, -0.9, 0.0),
        ];
        let cleaned = clean_observations(&input, &config);
        assert!(cleaned.iter().all(|c| !c.outlier && c.ndvi.is_some()));
    }

    #[test]
    fn test_weeks_share_bucket_across_years() {
        let config = PipelineConfig {
            week_numbering: WeekNumbering::DayOfYear,
            ..PipelineConfig::default()
        };
        // Week 1 of 2020 and week 1 of 2021: pooled, the high value is an outlier.
        let mut input = vec![
            obs(2020, 1, 2, 0.30, 0.0),
            obs(2020, 1, 3, 0.31, 0.0),
            obs(2021, 1, 2, 0.32, 0.0),
            obs(2021, 1, 3, 0.33, 0.0),
        ];
        input.push(obs(2021, 1, 4, 0.90, 0.0));

        let shared = clean_observations(&input, &config);
        assert_eq!(shared.iter().filter(|c| c.outlier).count(), 1);

        let year_aware = PipelineConfig {
            year_aware_weeks: true,
            ..config
        };
        let split = clean_observations(&input, &year_aware);
        assert_eq!(split.iter().filter(|c| c.outlier).count(), 0);
    }

    #[test]
    fn test_iso_week_53_shares_bucket_across_years() {
        let config = PipelineConfig::default();
        assert_eq!(config.week_numbering, WeekNumbering::Iso);

        // ISO week 53 exists in 2015 and 2020; 2021-01-02 still belongs to 2020-W53.
        let input = vec![
            obs(2015, 12, 28, 0.30, 0.0),
            obs(2015, 12, 29, 0.31, 0.0),
            obs(2020, 12, 28, 0.32, 0.0),
            obs(2020, 12, 29, 0.33, 0.0),
            obs(2021, 1, 2, 0.90, 0.0),
        ];
        assert!(input.iter().all(|o| WeekNumbering::Iso.week(o.date) == 53));

        let shared = clean_observations(&input, &config);
        assert_eq!(shared.iter().filter(|c| c.outlier).count(), 1);
        assert!(shared[4].outlier);

        let year_aware = PipelineConfig {
            year_aware_weeks: true,
            ..config
        };
        let split = clean_observations(&input, &year_aware);
        assert_eq!(split.iter().filter(|c| c.outlier).count(), 0);
    }

    #[test]
    fn test_bad_records_do_not_affect_fences() {
        let config = PipelineConfig::default();
        let mut input: Vec<Observation> = (1..=4).map(|d| obs(2020, 6, d, 0.6, 0.0)).collect();
        // A cloudy value far away must not widen the fences.
        input.push(obs(2020, 6, 5, -5.0, 0.9));
        input.push(obs(2020, 6, 6, 0.7, 0.0));

        let cleaned = clean_observations(&input, &config);
        let last = cleaned.last().unwrap();
        assert!(last.outlier);
        assert!(!cleaned[4].outlier);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn test_survivors_within_weekly_whiskers(
            values in proptest::collection::vec(-1.0f64..1.0, 1..30),
            cps in proptest::collection::vec(0.0f64..0.02, 30),
        ) {
            let config = PipelineConfig::default();
            let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
            let input: Vec<Observation> = values
                .iter()
                .zip(&cps)
                .enumerate()
                .map(|(i, (&v, &cp))| {
                    let date = start + chrono::Duration::days((i % 21) as i64);
                    Observation::new(date, Some(v), Some(cp))
                })
                .collect();

            let cleaned = clean_observations(&input, &config);

            for c in &cleaned {
                if c.observation.cloud_probability.unwrap() >= config.cloud_threshold {
                    prop_assert!(c.ndvi.is_none());
                }
            }

            let mut by_bucket: BTreeMap<WeekBucket, Vec<f64>> = BTreeMap::new();
            for c in cleaned.iter().filter(|c| c.quality.is_good()) {
                by_bucket.entry(c.bucket).or_default().push(c.observation.ndvi.unwrap());
            }
            for c in cleaned.iter().filter(|c| c.ndvi.is_some()) {
                let (lo, hi) = box_plot_fences(&by_bucket[&c.bucket], 1.5).unwrap();
                let v = c.ndvi.unwrap();
                prop_assert!(v >= lo && v <= hi);
            }
        }
    }
}
