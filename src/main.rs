mod app;
mod canvas;
mod chat;
mod completion;
mod config;
mod edit;
mod event;
mod theme;

use app::LeanCanvasApp;
use completion::openai::OpenAiCompatibleService;
use completion::CompletionDriver;
use eframe::egui;
use std::sync::{mpsc, Arc};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = config::load_from_env()?;
    config.validate()?;
    tracing::info!(
        service_kind = config.service_kind.as_str(),
        base_url = %config.base_url,
        model = %config.model_id,
        "starting lean canvas editor"
    );

    let (tx, rx) = mpsc::channel();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("lean-canvas-runtime")
        .build()?;

    let service = Arc::new(OpenAiCompatibleService::from_config(&config)?);
    let driver = CompletionDriver::new(service, runtime.handle().clone(), tx);

    let app = LeanCanvasApp::new(rx, driver, &config);
    let _runtime = runtime;

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1440.0, 860.0])
            .with_min_inner_size([1100.0, 640.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Lean Canvas Editor",
        native_options,
        Box::new(move |creation_context| {
            app.theme().apply_visuals(&creation_context.egui_ctx);
            Ok(Box::new(app))
        }),
    )?;

    Ok(())
}
