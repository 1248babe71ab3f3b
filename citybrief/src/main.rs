/*
citybrief - server binary
Loads the layered configuration, wires the weather, news, extraction and model
adapters into the orchestrator and serves the HTTP API until shutdown.
*/

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use common::{Config, ServerConfig};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use citybrief::server::{figment_from_config, launch_rocket, AppState};
use citybrief::summary::SummaryOrchestrator;

#[derive(Parser, Debug)]
#[command(name = "citybrief", about = "City weather + news briefing server")]
struct Args {
    /// Path to config.toml (overrides config.default.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Bind address, overrides [server].address
    #[arg(long)]
    address: Option<String>,

    /// Port, overrides [server].port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // API keys may live in .env
    dotenv::dotenv().ok();

    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let mut config = load_config(args.config).await?;

    if args.address.is_some() || args.port.is_some() {
        let server = config.server.get_or_insert_with(ServerConfig::default);
        if let Some(address) = args.address {
            server.address = Some(address);
        }
        if let Some(port) = args.port {
            server.port = Some(port);
        }
    }

    let orchestrator = SummaryOrchestrator::from_config(&config)
        .context("failed to build orchestrator")?;
    info!(
        model = orchestrator.model_name().as_deref().unwrap_or("none"),
        "orchestrator ready"
    );

    let state = AppState::new(Arc::new(orchestrator));
    info!("Launching Rocket HTTP server");
    if let Err(e) = launch_rocket(state, figment_from_config(&config)).await {
        error!(%e, "Rocket server failed");
        return Err(e);
    }
    Ok(())
}

/// `config.default.toml` merged with `--config FILE`, or with `config.toml`
/// when present.
async fn load_config(explicit: Option<PathBuf>) -> Result<Config> {
    let default_path = PathBuf::from("config.default.toml");

    let override_path = match explicit {
        Some(p) => {
            if !p.exists() {
                error!(path = ?p, "specified config file not found");
                anyhow::bail!("Config file not found: {}", p.display());
            }
            Some(p)
        }
        None => Some(PathBuf::from("config.toml")).filter(|p| p.exists()),
    };

    let config = Config::load_with_defaults(
        Some(default_path.as_path()).filter(|p| p.exists()),
        override_path.as_deref(),
    )
    .await
    .map_err(|e| {
        error!(%e, "failed to load configuration");
        e
    })?;
    info!(default = ?default_path, override = ?override_path, "configuration loaded");
    Ok(config)
}
