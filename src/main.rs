//! wavedeck entry point.

mod app;
mod commands;
mod config;
mod decode;
mod logging;
mod player;
mod ui;

#[tokio::main]
async fn main() {
    if let Err(e) = app::run().await {
        tracing::error!("Fatal error: {e}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
