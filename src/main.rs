mod app;
mod color;
mod state;
mod ui;

use app::DashboardApp;
use covid_dash::DashboardConfig;
use eframe::egui;

fn main() -> eframe::Result {
    env_logger::init();

    let config = DashboardConfig::from_env().unwrap_or_else(|e| {
        log::error!("{e:#}; falling back to the default configuration");
        DashboardConfig::default()
    });

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "COVID-19 Dashboard",
        options,
        Box::new(move |_cc| Ok(Box::new(DashboardApp::new(config)))),
    )
}
