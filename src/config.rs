use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::data::calendar::WeekNumbering;

// ---------------------------------------------------------------------------
// Pipeline configuration
// ---------------------------------------------------------------------------

/// Every tunable of a pipeline run. Missing keys in a settings file fall
/// back to the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Observations with a cloud probability at or above this are dropped.
    pub cloud_threshold: f64,
    pub week_numbering: WeekNumbering,
    /// Partition outliers by `(year, week)` instead of the bare week number.
    pub year_aware_weeks: bool,
    /// Box-plot whisker length in IQRs.
    pub whisker_coef: f64,
    pub savgol: SavGolConfig,
    pub spline: SplineConfig,
    pub loess: LoessConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cloud_threshold: 0.01,
            week_numbering: WeekNumbering::Iso,
            year_aware_weeks: false,
            whisker_coef: 1.5,
            savgol: SavGolConfig::default(),
            spline: SplineConfig::default(),
            loess: LoessConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SavGolConfig {
    pub order: usize,
    /// Odd number of samples in the sliding window.
    pub window: usize,
}

impl Default for SavGolConfig {
    fn default() -> Self {
        Self { order: 7, window: 15 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplineConfig {
    /// Roughness penalty λ with x in decimal years.
    pub lambda: f64,
}

impl Default for SplineConfig {
    fn default() -> Self {
        Self { lambda: 1e-5 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoessConfig {
    /// Neighbourhood width in multiples of the minimum sampling interval.
    pub window_intervals: f64,
    /// Local polynomial degree (0, 1 or 2).
    pub degree: usize,
    /// Bisquare reweighting passes; 0 gives a plain weighted fit.
    pub robust_iterations: usize,
}

impl Default for LoessConfig {
    fn default() -> Self {
        Self {
            window_intervals: 45.0,
            degree: 2,
            robust_iterations: 0,
        }
    }
}

impl PipelineConfig {
    /// Read a JSON settings file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings file {}", path.display()))?;
        let config: PipelineConfig = serde_json::from_str(&text).context("parsing settings JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no run could make sense of. Smoother-specific limits
    /// (window vs. series length) are checked by the smoothers themselves.
    pub fn validate(&self) -> Result<()> {
        if !self.cloud_threshold.is_finite() {
            bail!("cloud_threshold must be finite, got {}", self.cloud_threshold);
        }
        if !self.whisker_coef.is_finite() {
            bail!("whisker_coef must be finite, got {}", self.whisker_coef);
        }
        if !(self.spline.lambda.is_finite() && self.spline.lambda >= 0.0) {
            bail!("spline.lambda must be a non-negative number, got {}", self.spline.lambda);
        }
        if !(self.loess.window_intervals.is_finite() && self.loess.window_intervals > 0.0) {
            bail!(
                "loess.window_intervals must be positive, got {}",
                self.loess.window_intervals
            );
        }
        if self.loess.degree > 2 {
            bail!("loess.degree must be 0, 1 or 2, got {}", self.loess.degree);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_documented_constants() {
        let c = PipelineConfig::default();
        assert_eq!(c.cloud_threshold, 0.01);
        assert_eq!(c.whisker_coef, 1.5);
        assert_eq!(c.savgol, SavGolConfig { order: 7, window: 15 });
        assert_eq!(c.week_numbering, WeekNumbering::Iso);
        assert!(!c.year_aware_weeks);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "cloud_threshold": 0.2, "week_numbering": "day_of_year", "loess": {{ "degree": 1 }} }}"#
        )
        .unwrap();

        let c = PipelineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(c.cloud_threshold, 0.2);
        assert_eq!(c.week_numbering, WeekNumbering::DayOfYear);
        assert_eq!(c.loess.degree, 1);
        assert_eq!(c.loess.window_intervals, 45.0);
        assert_eq!(c.savgol.window, 15);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "loess": {{ "degree": 3 }} }}"#).unwrap();
        let err = PipelineConfig::from_json_file(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("degree"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(PipelineConfig::from_json_file(Path::new("/definitely/not/here.json")).is_err());
    }
}
