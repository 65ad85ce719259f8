use std::sync::Arc;
use anyhow::{Context, Result};
use quickgpt_core::config::app_data_dir;
use quickgpt_core::{
    Config, HotkeyBridge, OpenAIClient, PopupController, RequestOrchestrator, TranscriptStore,
};

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui};

fn init_file_logging() -> Result<()> {
    let log_dir = app_data_dir();
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {:?}", log_dir))?;

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("quickgpt.log"))
        .context("Failed to open log file")?;

    // The terminal belongs to the popup, so logs only go to the file
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(log_file))
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    if let Err(e) = init_file_logging() {
        eprintln!("Logging disabled: {e:#}");
    }

    let (config, config_problem) = Config::load_or_default();
    tracing::info!(hotkey = %config.hotkey, model = %config.default_model, debug = config.debug, "starting");

    let client = OpenAIClient::new(&config.api_base_url);
    let mut store = TranscriptStore::new(config.history_path(), config.default_model.clone());
    store.load();
    if let Some(e) = config_problem {
        store.append_system(format!("Config file ignored ({e:#}); using defaults."), false);
    }

    let popup = PopupController::new(
        store,
        RequestOrchestrator::new(Arc::new(client)),
        config.available_models(),
        config.debug,
    );
    let mut app = App::new(popup, config.hotkey.clone());

    let mut bridge = HotkeyBridge::with_platform_sources();
    app.popup.register_hotkey(&mut bridge, &config.hotkey);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();

    let result = run(&mut terminal, &mut events, &mut app, &bridge).await;

    bridge.unregister();
    tui::restore()?;
    tracing::info!("exiting");
    result
}

async fn run(
    terminal: &mut Tui,
    events: &mut EventHandler,
    app: &mut App,
    bridge: &HotkeyBridge,
) -> Result<()> {
    // Start hidden, like a popup waiting for its hotkey
    let mut visible = false;
    tui::hide(&ui::hidden_hint(app))?;

    while !app.should_quit {
        let Some(event) = events.next().await else {
            break;
        };
        let redraw = !matches!(event, tui::AppEvent::Tick);
        handler::handle_event(app, bridge, event);

        if app.popup.is_visible() != visible {
            visible = app.popup.is_visible();
            if visible {
                tui::show(terminal)?;
            } else {
                tui::hide(&ui::hidden_hint(app))?;
            }
        }

        let dirty = app.popup.take_render_request();
        if visible && (dirty || redraw) {
            terminal.draw(|frame| ui::render(app, frame))?;
        }
    }

    Ok(())
}
