//! Process bootstrap
//!
//! Logging setup and settings resolution, before any command runs.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::EnvFilter;

use flowlens_core::Settings;

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins over `level`.
pub fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .with_context(|| format!("Invalid log level {:?}", level))?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))
}

/// Settings file to read: explicit path, else the user config file
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(Settings::default_path)
}

/// Load and validate settings
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    let path = resolve_config_path(explicit);
    if let (Some(explicit), Some(path)) = (explicit, path.as_deref()) {
        if !path.exists() {
            return Err(anyhow!("Config file {:?} does not exist", explicit));
        }
    }
    Settings::load(path.as_deref()).context("Failed to load settings")
}
