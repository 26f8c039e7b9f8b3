use std::path::Path;

use tracing_subscriber::EnvFilter;

/// App code at debug; HTTP client internals log every connection, which at
/// one connection per request is pure noise.
const DEFAULT_FILTER: &str = "info,nowplaying=debug,hyper_util=warn,reqwest=warn,hyper=warn";

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Send all tracing output to `path` (appended). The terminal belongs to the
/// display, so nothing is written to stdout.
pub fn init(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(filter())
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("logging already initialised: {}", e))?;
    Ok(())
}
