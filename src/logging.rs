//! Tracing setup. The TUI owns stdout, so events go to a log file.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const ENV_LOG: &str = "HNAV_LOG";
const DEFAULT_FILTER: &str = "hnav=info";

/// Filter from `HNAV_LOG`, else the configured directive, else `hnav=info`.
pub fn build_filter(configured: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_env(ENV_LOG).unwrap_or_else(|_| {
        configured
            .and_then(|directive| EnvFilter::try_new(directive).ok())
            .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
    })
}

pub fn default_log_path() -> Result<PathBuf> {
    let dir = dirs::data_dir().context("Could not find data directory")?;
    Ok(dir.join("hnav").join("hnav.log"))
}

/// Install the global subscriber writing to `path`.
pub fn init(path: &Path, configured_filter: Option<&str>) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create log directory")?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    tracing_subscriber::registry()
        .with(build_filter(configured_filter))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;
    Ok(())
}
