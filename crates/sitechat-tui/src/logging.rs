use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "sitechat=info";

/// Log to a daily file; the terminal belongs to the UI.
///
/// Without a usable log directory the widget runs with logging off. Keep the
/// returned guard alive for the life of the process or buffered lines are
/// lost on exit.
pub fn init() -> Option<WorkerGuard> {
    match log_dir().and_then(|dir| init_in(&dir)) {
        Ok(guard) => Some(guard),
        Err(e) => {
            // Still on the normal screen, so stderr is visible
            eprintln!("sitechat: file logging disabled: {:#}", e);
            None
        }
    }
}

pub fn init_in(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;

    let appender = tracing_appender::rolling::daily(log_dir, "sitechat.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow!("Failed to install log subscriber: {}", e))?;

    Ok(guard)
}

pub fn log_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| anyhow!("Could not determine data directory"))?;

    Ok(data_dir.join("sitechat").join("logs"))
}
