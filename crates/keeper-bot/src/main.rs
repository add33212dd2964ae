//! Position-closing keeper - entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Position-closing keeper
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via KEEPER_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    keeper_telemetry::init_logging()?;

    info!("Starting keeper v{}", env!("CARGO_PKG_VERSION"));

    // Config path: CLI arg > KEEPER_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("KEEPER_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");

    let config = keeper_bot::AppConfig::load(&config_path)?;
    info!(
        rpc_url = %config.rpc_url,
        api_base = %config.api_base,
        assets = config.assets.len(),
        "Configuration loaded"
    );

    let app = keeper_bot::Application::new(config)?;
    app.run().await?;

    Ok(())
}
