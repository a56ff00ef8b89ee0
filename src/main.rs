mod action_bar;
mod annotation;
mod app;
mod blur;
mod canvas;
mod clipboard;
mod coords;
mod flatten;
mod history;
mod render;
mod state;
mod store;
mod theme;
mod toolbar;
mod tools;
mod ui_controls;

use eframe::egui;
use tracing_subscriber::EnvFilter;

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,snapink=debug")),
        )
        .init();

    let viewport = egui::ViewportBuilder::default()
        .with_title("SnapInk")
        .with_inner_size([1080.0, 760.0])
        .with_min_inner_size([640.0, 480.0]);

    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };

    eframe::run_native(
        "SnapInk",
        options,
        Box::new(|cc| Box::new(app::SnapInkApp::new(cc))),
    )
}
