//! Periskope core library: WhatsApp tool catalog, dispatcher and resilient API gateway,
//! shared by the CLI, the MCP stdio server and the web front end.

pub mod chat_id;
pub mod config;
pub mod gateway;
pub mod init;
pub mod mcp;
pub mod models;
pub mod normalize;
pub mod tools;
pub mod upstream;
pub mod web;

use anyhow::{Context, Result};
use std::sync::Arc;

/// Wire the dispatcher from loaded config: resolve settings, build the reqwest adapters and gateway.
pub fn build_dispatcher(config: &config::Config) -> Result<tools::Dispatcher> {
    let settings = config::UpstreamSettings::resolve(config)?;
    log::debug!(
        "upstream {} with {} fallback base url(s)",
        settings.base_url,
        settings.fallback_base_urls.len()
    );
    let gateway = gateway::MessagingGateway::from_settings(&settings)
        .context("building Periskope API clients")?;
    Ok(tools::Dispatcher::new(Arc::new(gateway)))
}
