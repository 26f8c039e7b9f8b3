use std::path::PathBuf;

use nowplaying::client::AnyPlayerClient;
use nowplaying::session::SessionStateMachine;
use nowplaying::terminal::{self, TerminalGuard, TerminalPresenter, TerminalTouchPanel};
use nowplaying::touch::TouchInput;
use nowplaying::{logging, weather};
use nowplaying_proto::config::Config;
use nowplaying_proto::platform;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

fn load_config() -> Config {
    // An explicit path wins over the per-user config file.
    let result = match std::env::args_os().nth(1) {
        Some(path) => Config::load_from(&PathBuf::from(path)),
        None => Config::load(),
    };
    result.unwrap_or_else(|e| {
        warn!("config: {:#}, using defaults", e);
        Config::default()
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log_path = platform::log_path();
    logging::init(&log_path)?;

    // Print log path to stderr so the operator can tail it immediately.
    eprintln!("nowplaying log: {}", log_path.display());
    info!("nowplaying starting…");

    let config = load_config();
    let cancel = CancellationToken::new();

    let client = AnyPlayerClient::from_config(&config)?;
    let weather = weather::spawn_feed(&config.weather, cancel.clone())?;

    // ── Display and touch ────────────────────────────────────────────────────
    let (guard, term) = TerminalGuard::enter()?;
    let presenter = TerminalPresenter::new(term, &config.display)?;
    let pointer_rx = terminal::spawn_input_reader(cancel.clone());
    let touch = TouchInput::new(TerminalTouchPanel::new(pointer_rx), &config.touch);
    let touch_rx = touch.receiver();
    let sampler = tokio::spawn(touch.run(cancel.clone()));

    // ── Ctrl-C outside raw mode (e.g. SIGINT from a supervisor) ──────────────
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("signal: interrupt received");
            signal_cancel.cancel();
        }
    });

    let session = SessionStateMachine::new(client, presenter, touch_rx, weather, &config);
    session.run(cancel.clone()).await;

    cancel.cancel();
    let _ = sampler.await;
    drop(guard);
    info!("nowplaying stopped");
    Ok(())
}
