mod app;

use app::UiApp;
use eframe::{NativeOptions, egui};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let options = NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Flora ID")
            .with_inner_size([960.0, 640.0]),
        ..Default::default()
    };
    if let Err(e) = eframe::run_native(
        "Flora ID",
        options,
        Box::new(|cc| Ok(Box::new(UiApp::new(&cc.egui_ctx)))),
    ) {
        eprintln!("Application stopped with error: {e}");
    }
}
