use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;

use super::calendar::decimal_year;
use crate::smooth::{Smoother, SmootherStatus};

// ---------------------------------------------------------------------------
// Observation – one satellite overpass
// ---------------------------------------------------------------------------

/// A single raw observation as read from the input table.
///
/// `ndvi` and `cloud_probability` are `None` when the source cell was empty
/// or could not be parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub date: NaiveDate,
    pub decimal_year: f64,
    pub ndvi: Option<f64>,
    pub cloud_probability: Option<f64>,
}

impl Observation {
    pub fn new(date: NaiveDate, ndvi: Option<f64>, cloud_probability: Option<f64>) -> Self {
        Observation {
            date,
            decimal_year: decimal_year(date),
            ndvi,
            cloud_probability,
        }
    }
}

// ---------------------------------------------------------------------------
// Quality flag
// ---------------------------------------------------------------------------

/// Cloud-probability classification of an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QualityFlag {
    Good,
    Bad,
}

impl QualityFlag {
    /// `Good` only for a finite cloud probability strictly below `threshold`.
    pub fn classify(cloud_probability: Option<f64>, threshold: f64) -> Self {
        match cloud_probability {
            Some(cp) if cp.is_finite() && cp < threshold => QualityFlag::Good,
            _ => QualityFlag::Bad,
        }
    }

    pub fn is_good(self) -> bool {
        self == QualityFlag::Good
    }
}

impl fmt::Display for QualityFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityFlag::Good => write!(f, "good"),
            QualityFlag::Bad => write!(f, "bad"),
        }
    }
}

// ---------------------------------------------------------------------------
// Week bucket – partition key for outlier removal
// ---------------------------------------------------------------------------

/// Week partition. `year` is `None` when weeks of different years share a
/// bucket (week 1 of 2020 and week 1 of 2021 are the same bucket).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WeekBucket {
    pub year: Option<i32>,
    /// Week number in 1..=53.
    pub week: u32,
}

impl fmt::Display for WeekBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.year {
            Some(y) => write!(f, "{y}-W{:02}", self.week),
            None => write!(f, "W{:02}", self.week),
        }
    }
}

// ---------------------------------------------------------------------------
// CleanedObservation – observation after quality and outlier filtering
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct CleanedObservation {
    pub observation: Observation,
    pub quality: QualityFlag,
    pub bucket: WeekBucket,
    /// Set when the value was removed by the weekly box-plot rule.
    pub outlier: bool,
    /// NDVI carried downstream; `None` when bad, missing or an outlier.
    pub ndvi: Option<f64>,
}

impl CleanedObservation {
    pub fn date(&self) -> NaiveDate {
        self.observation.date
    }

    pub fn decimal_year(&self) -> f64 {
        self.observation.decimal_year
    }
}

// ---------------------------------------------------------------------------
// Sample series – what the smoothers see
// ---------------------------------------------------------------------------

/// Cleaned `(decimal_year, ndvi)` pairs sorted ascending by decimal year.
/// Duplicate x values are kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleSeries {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl SampleSeries {
    /// Collect the surviving values of `cleaned`, stable-sorted by decimal year.
    pub fn from_cleaned(cleaned: &[CleanedObservation]) -> Self {
        let mut pairs: Vec<(f64, f64)> = cleaned
            .iter()
            .filter_map(|c| c.ndvi.map(|v| (c.decimal_year(), v)))
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        let (x, y) = pairs.into_iter().unzip();
        SampleSeries { x, y }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// First and last decimal year, if any samples exist.
    pub fn range(&self) -> Option<(f64, f64)> {
        Some((*self.x.first()?, *self.x.last()?))
    }
}

// ---------------------------------------------------------------------------
// DailyRecord / DailyTable – the combined output
// ---------------------------------------------------------------------------

/// One calendar day of the output table.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub decimal_year: f64,
    /// Raw NDVI of the first observation on this date.
    pub ndvi: Option<f64>,
    /// Raw cloud probability of the first observation on this date.
    pub cloud_probability: Option<f64>,
    /// Number of raw observations on this date.
    pub observation_count: usize,
    /// Mean of the cleaned samples on this date.
    pub ndvi_clean: Option<f64>,
    pub savgol: Option<f64>,
    pub spline: Option<f64>,
    pub loess: Option<f64>,
    pub linear: Option<f64>,
}

impl DailyRecord {
    pub fn smoothed(&self, smoother: Smoother) -> Option<f64> {
        match smoother {
            Smoother::SavitzkyGolay => self.savgol,
            Smoother::Spline => self.spline,
            Smoother::Loess => self.loess,
            Smoother::Linear => self.linear,
        }
    }

    pub fn set_smoothed(&mut self, smoother: Smoother, value: Option<f64>) {
        let slot = match smoother {
            Smoother::SavitzkyGolay => &mut self.savgol,
            Smoother::Spline => &mut self.spline,
            Smoother::Loess => &mut self.loess,
            Smoother::Linear => &mut self.linear,
        };
        *slot = value;
    }
}

/// Daily records in date order plus the outcome of each smoother.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyTable {
    pub records: Vec<DailyRecord>,
    pub status: BTreeMap<Smoother, SmootherStatus>,
}

impl DailyTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }
}

// ---------------------------------------------------------------------------
// Analysis – everything a single pipeline run produces
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    /// Every input observation with its quality/outlier annotation.
    pub observations: Vec<CleanedObservation>,
    /// The series handed to the smoothers.
    pub samples: SampleSeries,
    pub daily: DailyTable,
    /// LOESS neighbourhood fraction derived from the scaffold.
    pub loess_span: Option<f64>,
    pub start_year: i32,
    pub end_year: i32,
}

impl Analysis {
    pub fn years(&self) -> impl Iterator<Item = i32> {
        self.start_year..=self.end_year
    }

    pub fn bad_count(&self) -> usize {
        self.observations
            .iter()
            .filter(|o| !o.quality.is_good())
            .count()
    }

    pub fn outlier_count(&self) -> usize {
        self.observations.iter().filter(|o| o.outlier).count()
    }
}
