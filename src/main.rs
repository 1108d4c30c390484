mod app;
mod config;
mod pipeline;
mod state;
mod ui;

use anyhow::Context;
use app::LeafScanApp;
use config::AppConfig;
use eframe::egui;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = AppConfig::load().context("loading configuration")?;
    log::info!("Using model {}", config.model_path.display());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size(config.window_size)
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "LeafScan – Potato Leaf Disease Detector",
        options,
        Box::new(|cc| Ok(Box::new(LeafScanApp::new(&cc.egui_ctx, config)))),
    )
    .map_err(|e| anyhow::anyhow!("running the UI: {e}"))
}
