mod app;
mod color;
mod config;
mod data;
mod pipeline;
mod smooth;
mod state;
mod ui;

use std::path::PathBuf;

use anyhow::{Context, Result};
use app::NdviSmootherApp;
use clap::Parser;
use config::PipelineConfig;
use eframe::egui;
use state::AppState;

/// Clean and smooth NDVI time series.
#[derive(Parser, Debug)]
#[command(name = "ndvi-smoother", version, about, long_about = None)]
struct Cli {
    /// Pipeline settings file (JSON); missing keys use the defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the daily table to this CSV file and exit without opening the viewer
    #[arg(long, requires = "input")]
    export: Option<PathBuf>,

    /// NDVI observations (.csv, .json or .parquet)
    input: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };

    if let (Some(input), Some(output)) = (&cli.input, &cli.export) {
        let analysis = pipeline::run_file(input, &config)?;
        for (smoother, status) in &analysis.daily.status {
            log::info!("{smoother}: {status}");
        }
        return data::export::export_daily_csv(&analysis.daily, output);
    }

    let mut state = AppState {
        config,
        ..AppState::default()
    };
    if let Some(input) = &cli.input {
        state.load_path(input);
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "NDVI Smoother",
        options,
        Box::new(|_cc| Ok(Box::new(NdviSmootherApp::new(state)))),
    )
    .map_err(|e| anyhow::anyhow!("{e}"))
    .context("running the viewer")
}
