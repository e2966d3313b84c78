use chrono::Datelike;
use eframe::egui::{Color32, Ui};
use egui_plot::{Legend, Line, MarkerShape, Plot, PlotPoints, PlotUi, Points};

use crate::color::{self, smoother_color};
use crate::data::model::{Analysis, DailyRecord};
use crate::smooth::Smoother;
use crate::state::{AppState, PlotView};

// ---------------------------------------------------------------------------
// Central panel
// ---------------------------------------------------------------------------

/// Render the NDVI plot selected in the side panel.
pub fn ndvi_plot(ui: &mut Ui, state: &AppState) {
    let analysis = match &state.analysis {
        Some(a) => a,
        None => {
            ui.centered_and_justified(|ui: &mut Ui| {
                ui.heading("Open an NDVI table to begin  (File → Open…)");
            });
            return;
        }
    };

    match state.view {
        PlotView::TimeSeries => time_series_plot(ui, state, analysis),
        PlotView::DayOfYear => day_of_year_plot(ui, state, analysis),
    }
}

// ---------------------------------------------------------------------------
// Time series
// ---------------------------------------------------------------------------

fn time_series_plot(ui: &mut Ui, state: &AppState, analysis: &Analysis) {
    let records: Vec<&DailyRecord> = analysis
        .daily
        .records
        .iter()
        .filter(|r| state.in_window(r.date))
        .collect();

    Plot::new("ndvi_time_series")
        .legend(Legend::default())
        .x_axis_label("Decimal year")
        .y_axis_label("NDVI")
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
        .show(ui, |plot_ui| {
            let in_window = analysis
                .observations
                .iter()
                .filter(|c| state.in_window(c.date()));

            let mut clean = Vec::new();
            let mut bad = Vec::new();
            let mut outliers = Vec::new();
            for c in in_window {
                let Some(raw) = c.observation.ndvi.filter(|v| v.is_finite()) else {
                    continue;
                };
                let point = [c.decimal_year(), raw];
                if c.outlier {
                    outliers.push(point);
                } else if c.ndvi.is_some() {
                    clean.push(point);
                } else {
                    bad.push(point);
                }
            }

            if state.show_raw {
                scatter(plot_ui, "Cloudy", bad, color::BAD_POINT, MarkerShape::Cross);
            }
            if state.show_outliers {
                scatter(plot_ui, "Weekly outlier", outliers, color::OUTLIER_POINT, MarkerShape::Diamond);
            }
            if state.show_clean {
                scatter(plot_ui, "Clean", clean, color::GOOD_POINT, MarkerShape::Circle);
            }

            for smoother in Smoother::ALL {
                if !state.visible_smoothers.contains(&smoother) {
                    continue;
                }
                let values = records
                    .iter()
                    .map(|r| (r.decimal_year, r.smoothed(smoother)));
                draw_segments(plot_ui, smoother.label(), values, smoother_color(smoother), 2.0);
            }
        });
}

// ---------------------------------------------------------------------------
// Day-of-year overlay
// ---------------------------------------------------------------------------

fn day_of_year_plot(ui: &mut Ui, state: &AppState, analysis: &Analysis) {
    let smoother = state.overlay_smoother;

    Plot::new("ndvi_day_of_year")
        .legend(Legend::default())
        .x_axis_label("Day of year")
        .y_axis_label(format!("NDVI ({})", smoother.label()))
        .include_x(1.0)
        .include_x(366.0)
        .show(ui, |plot_ui| {
            for &year in &state.selected_years {
                let color = state
                    .year_colors
                    .as_ref()
                    .map_or(Color32::LIGHT_BLUE, |m| m.color_for(&year));

                let values = analysis
                    .daily
                    .records
                    .iter()
                    .filter(|r| r.date.year() == year)
                    .map(|r| (r.date.ordinal() as f64, r.smoothed(smoother)));
                draw_segments(plot_ui, &year.to_string(), values, color, 1.5);

                if state.show_clean {
                    let samples: Vec<[f64; 2]> = analysis
                        .observations
                        .iter()
                        .filter(|c| c.date().year() == year)
                        .filter_map(|c| c.ndvi.map(|v| [c.date().ordinal() as f64, v]))
                        .collect();
                    scatter(plot_ui, &year.to_string(), samples, color, MarkerShape::Circle);
                }
            }
        });
}

// ---------------------------------------------------------------------------
// Drawing helpers
// ---------------------------------------------------------------------------

fn scatter(plot_ui: &mut PlotUi, name: &str, points: Vec<[f64; 2]>, color: Color32, shape: MarkerShape) {
    if points.is_empty() {
        return;
    }
    let points: PlotPoints = points.into_iter().collect();
    plot_ui.points(
        Points::new(points)
            .name(name)
            .color(color)
            .shape(shape)
            .radius(2.5),
    );
}

/// Draw a smoothed column as one line per run of consecutive values, so
/// null days show as gaps. All segments share one legend entry.
fn draw_segments(
    plot_ui: &mut PlotUi,
    name: &str,
    values: impl Iterator<Item = (f64, Option<f64>)>,
    color: Color32,
    width: f32,
) {
    for segment in contiguous_runs(values) {
        let points: PlotPoints = segment.into_iter().collect();
        plot_ui.line(Line::new(points).name(name).color(color).width(width));
    }
}

/// Split `(x, y)` pairs at every missing `y`.
fn contiguous_runs(values: impl Iterator<Item = (f64, Option<f64>)>) -> Vec<Vec<[f64; 2]>> {
    let mut runs = Vec::new();
    let mut current: Vec<[f64; 2]> = Vec::new();
    for (x, y) in values {
        match y {
            Some(y) => current.push([x, y]),
            None if !current.is_empty() => runs.push(std::mem::take(&mut current)),
            None => {}
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runs_split_at_gaps() {
        let values = vec![
            (1.0, None),
            (2.0, Some(0.2)),
            (3.0, Some(0.3)),
            (4.0, None),
            (5.0, None),
            (6.0, Some(0.6)),
        ];
        let runs = contiguous_runs(values.into_iter());
        assert_eq!(runs, vec![vec![[2.0, 0.2], [3.0, 0.3]], vec![[6.0, 0.6]]]);
    }

    #[test]
    fn test_all_missing_gives_no_runs() {
        assert!(contiguous_runs([(1.0, None), (2.0, None)].into_iter()).is_empty());
    }
}
