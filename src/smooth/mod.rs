//! Smoothing engine: four independent curve fits evaluated on the daily grid.
//!
//! ```text
//!   SampleSeries (sorted, cleaned)          daily decimal years
//!            │                                      │
//!            ├──► savgol ──► interp ───────────────►│
//!            ├──► spline (extrapolates) ───────────►│──► Vec<Option<f64>> per smoother
//!            ├──► loess (span from scaffold) ──────►│
//!            └──► interp ──────────────────────────►│
//! ```
//!
//! A failing smoother yields an all-null column and a `Failed` status; the
//! others are unaffected.

pub mod interp;
pub mod linalg;
pub mod loess;
pub mod savgol;
pub mod spline;

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::config::PipelineConfig;
use crate::data::model::SampleSeries;

// ---------------------------------------------------------------------------
// Smoother identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Smoother {
    SavitzkyGolay,
    Spline,
    Loess,
    Linear,
}

impl Smoother {
    pub const ALL: [Smoother; 4] = [
        Smoother::SavitzkyGolay,
        Smoother::Spline,
        Smoother::Loess,
        Smoother::Linear,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Smoother::SavitzkyGolay => "Savitzky-Golay",
            Smoother::Spline => "Smoothing spline",
            Smoother::Loess => "LOESS",
            Smoother::Linear => "Linear interpolation",
        }
    }
}

impl fmt::Display for Smoother {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Errors and status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SmoothError {
    #[error("needs at least {needed} samples, got {got}")]
    TooFewSamples { needed: usize, got: usize },

    #[error("needs at least {needed} distinct dates, got {got}")]
    TooFewDistinct { needed: usize, got: usize },

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("singular system while fitting {0}")]
    Singular(&'static str),

    #[error("no neighbourhood span could be derived from the daily grid")]
    NoSpan,
}

/// Outcome of one smoother for one run.
#[derive(Debug, Clone, PartialEq)]
pub enum SmootherStatus {
    /// Fitted; `coverage` days received a value.
    Ok { coverage: usize },
    /// Produced no output for this run.
    Failed(SmoothError),
}

impl SmootherStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, SmootherStatus::Ok { .. })
    }
}

impl fmt::Display for SmootherStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmootherStatus::Ok { coverage } => write!(f, "ok ({coverage} days)"),
            SmootherStatus::Failed(e) => write!(f, "no output: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Per-smoother daily columns aligned with the evaluation grid.
#[derive(Debug, Clone, PartialEq)]
pub struct SmootherOutputs {
    pub columns: BTreeMap<Smoother, Vec<Option<f64>>>,
    pub status: BTreeMap<Smoother, SmootherStatus>,
}

/// Fit a single smoother and evaluate it at every `grid` point.
pub fn run_smoother(
    smoother: Smoother,
    samples: &SampleSeries,
    grid: &[f64],
    loess_span: Option<f64>,
    config: &PipelineConfig,
) -> Result<Vec<Option<f64>>, SmoothError> {
    let values = match smoother {
        Smoother::SavitzkyGolay => {
            let smoothed = savgol::savgol_filter(&samples.y, config.savgol.window, config.savgol.order)?;
            interp::Interpolator::new(&samples.x, &smoothed)?.evaluate(grid)
        }
        Smoother::Spline => spline::SmoothingSpline::fit(&samples.x, &samples.y, config.spline.lambda)?
            .evaluate(grid),
        Smoother::Loess => {
            let span = loess_span.ok_or(SmoothError::NoSpan)?;
            loess::Loess::new(span, config.loess.degree, config.loess.robust_iterations)
                .fit(&samples.x, &samples.y)?
                .evaluate(grid)
        }
        Smoother::Linear => interp::Interpolator::new(&samples.x, &samples.y)?.evaluate(grid),
    };

    Ok(values
        .into_iter()
        .map(|v| v.filter(|v| v.is_finite()))
        .collect())
}

/// Run every smoother independently. Failures are logged and recorded; the
/// corresponding column is all `None`.
pub fn run_smoothers(
    samples: &SampleSeries,
    grid: &[f64],
    loess_span: Option<f64>,
    config: &PipelineConfig,
) -> SmootherOutputs {
    let mut columns = BTreeMap::new();
    let mut status = BTreeMap::new();

    for smoother in Smoother::ALL {
        match run_smoother(smoother, samples, grid, loess_span, config) {
            Ok(values) => {
                let coverage = values.iter().filter(|v| v.is_some()).count();
                log::info!("{smoother}: {coverage} of {} days", grid.len());
                columns.insert(smoother, values);
                status.insert(smoother, SmootherStatus::Ok { coverage });
            }
            Err(e) => {
                log::warn!("{smoother} produced no output: {e}");
                columns.insert(smoother, vec![None; grid.len()]);
                status.insert(smoother, SmootherStatus::Failed(e));
            }
        }
    }

    SmootherOutputs { columns, status }
}
