use anyhow::{Context, Result};
use std::path::PathBuf;

const APP_DIR: &str = "insights-mailer";

/// Overrides the config file location (handy for containers).
pub const CONFIG_PATH_ENV: &str = "INSIGHTS_MAILER_CONFIG";

pub fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR))
        .context("Unable to determine config directory")
}

pub fn config_file() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    Ok(config_dir()?.join("config.toml"))
}
