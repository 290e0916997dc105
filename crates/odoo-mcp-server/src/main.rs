//! `odoo-mcp-server` binary

use anyhow::Context;
use clap::Parser;
use odoo_mcp_server::{AppState, SERVER_VERSION, ServerConfig, http};
use std::path::PathBuf;
use tracing::info;

/// Odoo MCP server with an OAuth 2.1 protected HTTP endpoint
#[derive(Parser, Debug)]
#[command(name = "odoo-mcp-server", version, about)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, short = 'c', env = "ODOO_MCP_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overrides `http.host`
    #[arg(long)]
    host: Option<String>,

    /// Listen port, overrides `http.port`
    #[arg(long, short = 'p')]
    port: Option<u16>,

    /// Log level or filter directives, overrides `logging.level`
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ServerConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(host) = cli.host {
        config.http.host = host;
    }
    if let Some(port) = cli.port {
        config.http.port = port;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    let _log_guard = config.logging.init().context("failed to initialize logging")?;

    info!(
        version = SERVER_VERSION,
        odoo = %config.odoo.url,
        database = %config.odoo.database,
        provider = ?config.oauth.provider,
        "Starting Odoo MCP server"
    );

    let state = AppState::from_config(config).context("failed to initialize server state")?;
    http::serve(state).await.context("HTTP server failed")?;
    Ok(())
}
