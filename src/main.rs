//! Main entry point for the credential proxy

use clap::Parser;
use credential_proxy::{build_routes, init_logger, log_error, log_info, ProxyConfig, ProxyServer};
use std::net::SocketAddr;
use std::path::Path;
use tracing::warn;

#[derive(Parser)]
#[command(name = "credential-proxy")]
#[command(about = "Forwards internal calls to payment backends, injecting their credentials")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yml")]
    config: String,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    /// Listening address; overrides the config file
    #[arg(short, long)]
    listen_addr: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_found = Path::new(&cli.config).exists();
    let mut config = ProxyConfig::load_config(&cli.config)?;
    if let Some(log_level) = cli.log_level {
        config.log_level = log_level;
    }
    if let Some(listen_addr) = cli.listen_addr {
        config.listen_addr = listen_addr;
    }

    init_logger(&config.log_level);
    if !config_found {
        warn!("Config file '{}' not found, using defaults", cli.config);
    }

    log_info!("🚀 Starting credential proxy");
    log_info!("📋 Version: {}", env!("CARGO_PKG_VERSION"));
    log_info!("Registered services: {}", config.services.len());
    if !config.enabled {
        log_info!("⚠️  Proxy is disabled; every request will get 404");
    }

    let routes = build_routes(&config)?;
    let server = ProxyServer::new(config.listen_addr, config.max_body_size, routes);

    if let Err(e) = server.start().await {
        log_error!("Server error: {}", e);
        return Err(e);
    }

    Ok(())
}
