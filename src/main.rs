use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use csv_loader::config::LoaderConfig;
use csv_loader::constants::{ENV_CONFIG_PATH, ENV_METRICS_PORT};
use csv_loader::infra::clients::Clients;
use csv_loader::logging;
use csv_loader::observability;
use csv_loader::server::{self, AppState};

#[derive(Parser)]
#[command(name = "csv_loader")]
#[command(about = "Loads uploaded CSV files into a warehouse table")]
#[command(version)]
struct Cli {
    /// Path to a TOML config file (overrides CSV_LOADER_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to bind, e.g. 0.0.0.0:8080 (defaults to server.bind, or PORT when set)
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env must be loaded before the subscriber reads RUST_LOG and CSV_LOADER_LOG_DIR
    dotenv::dotenv().ok();
    let _log_guard = logging::init_logging();
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        std::env::set_var(ENV_CONFIG_PATH, path);
    }
    let config = Arc::new(LoaderConfig::load()?);

    if let Ok(port) = std::env::var(ENV_METRICS_PORT) {
        match port.parse::<u16>() {
            Ok(port) => observability::init_metrics(port),
            Err(_) => warn!("Ignoring invalid {}='{}'", ENV_METRICS_PORT, port),
        }
    }

    let bind = cli
        .bind
        .or_else(|| std::env::var("PORT").ok().map(|p| format!("0.0.0.0:{}", p)))
        .unwrap_or_else(|| config.server.bind.clone());
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid bind address '{}'", bind))?;

    let clients = Arc::new(Clients::from_config(config.clone()));
    info!(table = %config.table_id(), "Starting csv_loader");
    server::serve(AppState::new(config, clients), addr).await
}
