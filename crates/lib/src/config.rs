//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.periskope/config.json`) and environment.
//! Environment variables win over the file so existing `.env`-style setups keep working.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Canonical Periskope API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.periskope.app/v1";

/// Alternative base URLs tried, in order, when the canonical one fails.
pub const DEFAULT_FALLBACK_BASE_URLS: &[&str] = &[
    "https://api.periskope.app/api/v1",
    "https://api.periskope.app",
    "https://api.periskope.app/v2",
];

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Upstream API credentials and endpoints.
    #[serde(default)]
    pub periskope: PeriskopeConfig,

    /// HTTP front end settings.
    #[serde(default)]
    pub web: WebConfig,
}

/// Periskope API settings. Credentials are opaque strings passed through to the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriskopeConfig {
    /// Bearer token. Overridden by PERISKOPE_API_KEY env.
    pub api_key: Option<String>,

    /// Sender phone identity sent as `x-phone`. Overridden by PERISKOPE_PHONE_NUMBER env.
    pub phone: Option<String>,

    /// Canonical base URL. Overridden by PERISKOPE_BASE_URL env.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Alternative base URLs tried after the canonical one fails.
    #[serde(default = "default_fallback_base_urls")]
    pub fallback_base_urls: Vec<String>,

    /// Per-attempt HTTP timeout in seconds (default 30).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// HTTP front end bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebConfig {
    /// Port (default 3000). Overridden by PORT env.
    #[serde(default = "default_web_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_web_bind")]
    pub bind: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_fallback_base_urls() -> Vec<String> {
    DEFAULT_FALLBACK_BASE_URLS.iter().map(|s| s.to_string()).collect()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_web_port() -> u16 {
    3000
}

fn default_web_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for PeriskopeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            phone: None,
            base_url: default_base_url(),
            fallback_base_urls: default_fallback_base_urls(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            port: default_web_port(),
            bind: default_web_bind(),
        }
    }
}

/// Auth material for every upstream request.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub phone: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("phone", &self.phone)
            .finish()
    }
}

/// Resolved, immutable upstream settings handed to the gateway at startup.
#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    pub credentials: Credentials,
    pub base_url: String,
    pub fallback_base_urls: Vec<String>,
    pub timeout: Duration,
}

impl UpstreamSettings {
    /// Merge env overrides into the file config. Fails when no API key is available.
    pub fn resolve(config: &Config) -> Result<Self> {
        let api_key = resolve_api_key(config).context(
            "periskope API key not configured (set PERISKOPE_API_KEY or periskope.apiKey)",
        )?;
        let phone = resolve_phone(config).unwrap_or_default();
        if phone.is_empty() {
            log::warn!("no sender phone configured (PERISKOPE_PHONE_NUMBER); requests go out without x-phone identity");
        }
        let base_url = env_non_empty("PERISKOPE_BASE_URL")
            .unwrap_or_else(|| config.periskope.base_url.trim().to_string());
        Ok(Self {
            credentials: Credentials { api_key, phone },
            base_url,
            fallback_base_urls: config
                .periskope
                .fallback_base_urls
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            timeout: Duration::from_secs(config.periskope.timeout_secs.max(1)),
        })
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolve the API key: env PERISKOPE_API_KEY overrides config.
pub fn resolve_api_key(config: &Config) -> Option<String> {
    env_non_empty("PERISKOPE_API_KEY").or_else(|| trimmed(&config.periskope.api_key))
}

/// Resolve the sender phone: env PERISKOPE_PHONE_NUMBER overrides config.
pub fn resolve_phone(config: &Config) -> Option<String> {
    env_non_empty("PERISKOPE_PHONE_NUMBER").or_else(|| trimmed(&config.periskope.phone))
}

/// Resolve the web port: env PORT overrides config.
pub fn resolve_web_port(config: &Config) -> u16 {
    env_non_empty("PORT")
        .and_then(|p| p.parse().ok())
        .unwrap_or(config.web.port)
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("PERISKOPE_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".periskope").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path, PERISKOPE_CONFIG_PATH, or the default. Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
