use std::fs::{self, OpenOptions};
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use ragchat_core::Config;
use tracing_subscriber::EnvFilter;

/// Send diagnostics to a log file; stderr belongs to the terminal UI.
///
/// Verbosity follows `RUST_LOG`, defaulting to `info`.
pub fn init(config: &Config) -> Result<()> {
    let path = config.log_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|err| anyhow!("Failed to initialise logging: {}", err))?;

    tracing::info!(log = %path.display(), "logging initialised");
    Ok(())
}
