use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::NaiveDate;

use crate::color::ColorMap;
use crate::config::PipelineConfig;
use crate::data::model::{Analysis, Observation};
use crate::pipeline;
use crate::smooth::Smoother;

// ---------------------------------------------------------------------------
// View selection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotView {
    /// NDVI against decimal year over the whole record.
    TimeSeries,
    /// One curve per year against day of year.
    DayOfYear,
}

impl PlotView {
    pub const ALL: [PlotView; 2] = [PlotView::TimeSeries, PlotView::DayOfYear];

    pub fn label(self) -> &'static str {
        match self {
            PlotView::TimeSeries => "Time series",
            PlotView::DayOfYear => "Day-of-year overlay",
        }
    }
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    /// Raw observations of the loaded file, kept so settings changes can re-run.
    pub observations: Option<Vec<Observation>>,
    pub source_path: Option<PathBuf>,

    /// Settings the next run will use.
    pub config: PipelineConfig,

    /// Result of the last successful run.
    pub analysis: Option<Analysis>,

    pub view: PlotView,
    pub show_raw: bool,
    pub show_clean: bool,
    pub show_outliers: bool,
    pub visible_smoothers: BTreeSet<Smoother>,

    /// Curve drawn per year in the overlay view.
    pub overlay_smoother: Smoother,
    pub selected_years: BTreeSet<i32>,
    pub year_colors: Option<ColorMap<i32>>,

    /// Inclusive date window of the time-series view.
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            observations: None,
            source_path: None,
            config: PipelineConfig::default(),
            analysis: None,
            view: PlotView::TimeSeries,
            show_raw: true,
            show_clean: true,
            show_outliers: true,
            visible_smoothers: Smoother::ALL.into_iter().collect(),
            overlay_smoother: Smoother::Spline,
            selected_years: BTreeSet::new(),
            year_colors: None,
            window_start: NaiveDate::MIN,
            window_end: NaiveDate::MAX,
            status_message: None,
        }
    }
}

impl AppState {
    /// Load a data file and run the pipeline on it.
    pub fn load_path(&mut self, path: &Path) {
        match crate::data::loader::load_file(path) {
            Ok(observations) => {
                log::info!("Loaded {} observations from {}", observations.len(), path.display());
                self.source_path = Some(path.to_path_buf());
                self.set_observations(observations);
            }
            Err(e) => {
                log::error!("Failed to load file: {e:#}");
                self.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }

    /// Ingest newly loaded observations and run the pipeline with the
    /// current settings. The view is reset to the new data's extent.
    pub fn set_observations(&mut self, observations: Vec<Observation>) {
        self.observations = Some(observations);
        self.analysis = None;
        self.rerun();
        if let Some(analysis) = &self.analysis {
            self.selected_years = analysis.years().collect();
            self.year_colors = Some(ColorMap::new(analysis.years()));
        }
        self.reset_window();
    }

    /// Re-run the pipeline on the loaded observations. On failure the
    /// previous analysis is kept and the error is shown.
    pub fn rerun(&mut self) {
        let Some(observations) = &self.observations else {
            return;
        };
        match pipeline::run(observations.clone(), &self.config) {
            Ok(analysis) => {
                let failed: Vec<String> = analysis
                    .daily
                    .status
                    .iter()
                    .filter(|(_, s)| !s.is_ok())
                    .map(|(smoother, _)| smoother.to_string())
                    .collect();
                self.status_message = (!failed.is_empty())
                    .then(|| format!("No output from: {}", failed.join(", ")));
                self.analysis = Some(analysis);
            }
            Err(e) => {
                log::error!("Pipeline failed: {e}");
                self.status_message = Some(format!("Error: {e}"));
            }
        }
    }

    /// Replace the settings and re-run.
    pub fn set_config(&mut self, config: PipelineConfig) {
        self.config = config;
        self.rerun();
    }

    pub fn load_config(&mut self, path: &Path) -> Result<()> {
        let config = PipelineConfig::from_json_file(path)?;
        log::info!("Loaded settings from {}", path.display());
        self.set_config(config);
        Ok(())
    }

    /// Window spanning the full daily table.
    pub fn reset_window(&mut self) {
        if let Some(analysis) = &self.analysis {
            let records = &analysis.daily.records;
            if let (Some(first), Some(last)) = (records.first(), records.last()) {
                self.window_start = first.date;
                self.window_end = last.date;
            }
        }
    }

    pub fn in_window(&self, date: NaiveDate) -> bool {
        date >= self.window_start && date <= self.window_end
    }

    pub fn toggle_smoother(&mut self, smoother: Smoother) {
        if !self.visible_smoothers.remove(&smoother) {
            self.visible_smoothers.insert(smoother);
        }
    }

    pub fn toggle_year(&mut self, year: i32) {
        if !self.selected_years.remove(&year) {
            self.selected_years.insert(year);
        }
    }

    pub fn select_all_years(&mut self) {
        if let Some(analysis) = &self.analysis {
            self.selected_years = analysis.years().collect();
        }
    }

    pub fn select_no_years(&mut self) {
        self.selected_years.clear();
    }
}
