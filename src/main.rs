//! Netgraph Native
//!
//! Desktop viewer for the crawled network topology: a force-directed graph
//! of hosts and their neighbour links.

mod api;
mod app;
mod db;
mod graph;
mod search;
mod settings;
mod theme;

use eframe::egui;
use tracing_subscriber::EnvFilter;

fn main() -> eframe::Result<()> {
    // Initialize logging, RUST_LOG wins over the default level
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 900.0])
            .with_title("Netgraph"),
        persist_window: true,
        ..Default::default()
    };

    eframe::run_native(
        "Netgraph",
        options,
        Box::new(|cc| Ok(Box::new(app::NetgraphApp::new(cc)))),
    )
}
