use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use egui_extras::DatePickerButton;

use crate::color::smoother_color;
use crate::config::PipelineConfig;
use crate::data::calendar::WeekNumbering;
use crate::smooth::Smoother;
use crate::state::{AppState, PlotView};

// ---------------------------------------------------------------------------
// Left side panel
// ---------------------------------------------------------------------------

/// Render the left panel: series, view, date window, settings, status.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("NDVI smoother");
    ui.separator();

    if state.analysis.is_none() {
        ui.label("No dataset loaded.");
        ui.add_space(8.0);
    }

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            series_section(ui, state);
            view_section(ui, state);
            window_section(ui, state);
            settings_section(ui, state);
            status_section(ui, state);
        });
}

fn series_section(ui: &mut Ui, state: &mut AppState) {
    egui::CollapsingHeader::new(RichText::new("Series").strong())
        .id_salt("series")
        .default_open(true)
        .show(ui, |ui: &mut Ui| {
            ui.checkbox(&mut state.show_clean, "Clean observations");
            ui.checkbox(&mut state.show_raw, "Cloudy observations");
            ui.checkbox(&mut state.show_outliers, "Weekly outliers");
            ui.separator();
            for smoother in Smoother::ALL {
                let mut checked = state.visible_smoothers.contains(&smoother);
                let text = RichText::new(smoother.label()).color(smoother_color(smoother));
                if ui.checkbox(&mut checked, text).changed() {
                    state.toggle_smoother(smoother);
                }
            }
        });
}

fn view_section(ui: &mut Ui, state: &mut AppState) {
    egui::CollapsingHeader::new(RichText::new("View").strong())
        .id_salt("view")
        .default_open(true)
        .show(ui, |ui: &mut Ui| {
            egui::ComboBox::from_id_salt("plot_view")
                .selected_text(state.view.label())
                .show_ui(ui, |ui: &mut Ui| {
                    for view in PlotView::ALL {
                        ui.selectable_value(&mut state.view, view, view.label());
                    }
                });

            if state.view != PlotView::DayOfYear {
                return;
            }

            ui.strong("Curve");
            egui::ComboBox::from_id_salt("overlay_smoother")
                .selected_text(state.overlay_smoother.label())
                .show_ui(ui, |ui: &mut Ui| {
                    for smoother in Smoother::ALL {
                        ui.selectable_value(&mut state.overlay_smoother, smoother, smoother.label());
                    }
                });

            let years: Vec<i32> = match &state.analysis {
                Some(a) => a.years().collect(),
                None => return,
            };
            ui.horizontal(|ui: &mut Ui| {
                ui.strong(format!("Years  ({}/{})", state.selected_years.len(), years.len()));
                if ui.small_button("All").clicked() {
                    state.select_all_years();
                }
                if ui.small_button("None").clicked() {
                    state.select_no_years();
                }
            });
            for year in years {
                let mut checked = state.selected_years.contains(&year);
                let mut text = RichText::new(year.to_string());
                if let Some(cm) = &state.year_colors {
                    text = text.color(cm.color_for(&year));
                }
                if ui.checkbox(&mut checked, text).changed() {
                    state.toggle_year(year);
                }
            }
        });
}

fn window_section(ui: &mut Ui, state: &mut AppState) {
    if state.analysis.is_none() {
        return;
    }
    egui::CollapsingHeader::new(RichText::new("Date window").strong())
        .id_salt("date_window")
        .default_open(false)
        .show(ui, |ui: &mut Ui| {
            egui::Grid::new("date_window_grid").show(ui, |ui: &mut Ui| {
                ui.label("From");
                ui.add(DatePickerButton::new(&mut state.window_start).id_salt("window_start"));
                ui.end_row();
                ui.label("To");
                ui.add(DatePickerButton::new(&mut state.window_end).id_salt("window_end"));
                ui.end_row();
            });
            if state.window_end < state.window_start {
                ui.label(RichText::new("Window is empty").color(Color32::YELLOW));
            }
            if ui.button("Full range").clicked() {
                state.reset_window();
            }
        });
}

fn settings_section(ui: &mut Ui, state: &mut AppState) {
    egui::CollapsingHeader::new(RichText::new("Settings").strong())
        .id_salt("settings")
        .default_open(false)
        .show(ui, |ui: &mut Ui| {
            let config = &mut state.config;
            egui::Grid::new("settings_grid").num_columns(2).show(ui, |ui: &mut Ui| {
                ui.label("Cloud threshold");
                ui.add(egui::DragValue::new(&mut config.cloud_threshold).speed(0.001).range(0.0..=1.0));
                ui.end_row();

                ui.label("Week numbering");
                egui::ComboBox::from_id_salt("week_numbering")
                    .selected_text(config.week_numbering.label())
                    .show_ui(ui, |ui: &mut Ui| {
                        for numbering in WeekNumbering::ALL {
                            ui.selectable_value(&mut config.week_numbering, numbering, numbering.label());
                        }
                    });
                ui.end_row();

                ui.label("Weeks per year");
                ui.checkbox(&mut config.year_aware_weeks, "");
                ui.end_row();

                ui.label("Whisker (× IQR)");
                ui.add(egui::DragValue::new(&mut config.whisker_coef).speed(0.05).range(0.0..=10.0));
                ui.end_row();

                ui.label("Savitzky-Golay order");
                ui.add(egui::DragValue::new(&mut config.savgol.order).range(0..=12));
                ui.end_row();

                ui.label("Savitzky-Golay window");
                ui.add(egui::DragValue::new(&mut config.savgol.window).range(1..=99));
                ui.end_row();

                ui.label("Spline λ");
                ui.add(
                    egui::DragValue::new(&mut config.spline.lambda)
                        .speed(1e-6)
                        .range(0.0..=1.0)
                        .max_decimals(8),
                );
                ui.end_row();

                ui.label("LOESS window (intervals)");
                ui.add(egui::DragValue::new(&mut config.loess.window_intervals).speed(1.0).range(1.0..=5000.0));
                ui.end_row();

                ui.label("LOESS degree");
                ui.add(egui::DragValue::new(&mut config.loess.degree).range(0..=2));
                ui.end_row();

                ui.label("LOESS robustness passes");
                ui.add(egui::DragValue::new(&mut config.loess.robust_iterations).range(0..=10));
                ui.end_row();
            });

            ui.horizontal(|ui: &mut Ui| {
                let can_run = state.observations.is_some();
                if ui.add_enabled(can_run, egui::Button::new("Re-run")).clicked() {
                    state.rerun();
                }
                if ui.button("Defaults").clicked() {
                    state.set_config(PipelineConfig::default());
                }
            });
        });
}

fn status_section(ui: &mut Ui, state: &AppState) {
    let Some(analysis) = &state.analysis else {
        return;
    };
    egui::CollapsingHeader::new(RichText::new("Run summary").strong())
        .id_salt("run_summary")
        .default_open(true)
        .show(ui, |ui: &mut Ui| {
            ui.label(format!(
                "{} observations: {} cloudy, {} outliers, {} samples",
                analysis.observations.len(),
                analysis.bad_count(),
                analysis.outlier_count(),
                analysis.samples.len()
            ));
            ui.label(format!(
                "{} days, {}–{}",
                analysis.daily.len(),
                analysis.start_year,
                analysis.end_year
            ));
            match analysis.loess_span {
                Some(span) => ui.label(format!("LOESS span {span:.4}")),
                None => ui.label("LOESS span unavailable"),
            };
            ui.separator();
            for (smoother, status) in &analysis.daily.status {
                let color = if status.is_ok() { smoother_color(*smoother) } else { Color32::RED };
                ui.label(RichText::new(format!("{smoother}: {status}")).color(color));
            }
        });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
            if ui
                .add_enabled(state.analysis.is_some(), egui::Button::new("Export daily table…"))
                .clicked()
            {
                export_dialog(state);
                ui.close_menu();
            }
            ui.separator();
            if ui.button("Load settings…").clicked() {
                load_settings_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        if let Some(path) = &state.source_path {
            let name = path.file_name().map_or_else(
                || path.display().to_string(),
                |n| n.to_string_lossy().into_owned(),
            );
            ui.label(name);
        }
        if let Some(analysis) = &state.analysis {
            ui.label(format!(
                "{} observations, {} clean samples",
                analysis.observations.len(),
                analysis.samples.len()
            ));
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open NDVI observations")
        .add_filter("Supported files", &["csv", "txt", "json", "parquet", "pq"])
        .add_filter("CSV", &["csv", "txt"])
        .add_filter("JSON", &["json"])
        .add_filter("Parquet", &["parquet", "pq"])
        .pick_file();

    if let Some(path) = file {
        state.load_path(&path);
    }
}

pub fn export_dialog(state: &mut AppState) {
    let Some(analysis) = &state.analysis else {
        return;
    };
    let default_name = state
        .source_path
        .as_ref()
        .and_then(|p| p.file_stem())
        .map_or_else(|| "ndvi_daily.csv".to_string(), |s| format!("{}_daily.csv", s.to_string_lossy()));

    let Some(path) = rfd::FileDialog::new()
        .set_title("Export daily table")
        .add_filter("CSV", &["csv"])
        .set_file_name(default_name)
        .save_file()
    else {
        return;
    };

    match crate::data::export::export_daily_csv(&analysis.daily, &path) {
        Ok(()) => state.status_message = None,
        Err(e) => {
            log::error!("Export failed: {e:#}");
            state.status_message = Some(format!("Error: {e:#}"));
        }
    }
}

pub fn load_settings_dialog(state: &mut AppState) {
    let Some(path) = rfd::FileDialog::new()
        .set_title("Load pipeline settings")
        .add_filter("JSON", &["json"])
        .pick_file()
    else {
        return;
    };

    if let Err(e) = state.load_config(&path) {
        log::error!("Failed to load settings: {e:#}");
        state.status_message = Some(format!("Error: {e:#}"));
    }
}
