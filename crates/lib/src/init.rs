//! Initialize the configuration directory: create `~/.periskope` and a default `config.json`.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::Config;

/// Serialized defaults with empty credential slots, so the file shows every key a user can set.
pub fn default_config_template() -> Result<String> {
    let mut config = Config::default();
    config.periskope.api_key = Some(String::new());
    config.periskope.phone = Some(String::new());
    serde_json::to_string_pretty(&config).context("serializing default config")
}

/// Create the config directory and write `config.json` if missing. An existing file is left alone.
/// Returns the config directory.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if config_path.exists() {
        log::debug!("config already exists at {}, skipping", config_path.display());
    } else {
        let template = default_config_template()?;
        std::fs::write(config_path, template)
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    }

    Ok(config_dir.to_path_buf())
}
