//! `circlefield-server`: runs a Circlefield arena server.

use std::path::{Path, PathBuf};

use circlefield::prelude::*;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Port to listen on
    #[arg(short, long, default_value_t = 3000)]
    port: u16,
    /// Simulation ticks per second, overriding the config file
    #[arg(short, long)]
    tick_rate: Option<u32>,
    /// JSON file with arena settings; missing fields use the defaults
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), CirclefieldError> {
    let args = Args::parse();

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_target(true)
        .compact()
        .init();

    let mut arena = match &args.config {
        Some(path) => load_arena(path)?,
        None => ArenaConfig::default(),
    };
    if let Some(rate) = args.tick_rate {
        arena.tick_rate_hz = rate;
    }

    let addr = format!("{}:{}", args.host, args.port);
    tracing::info!(%addr, tick_rate_hz = arena.tick_rate_hz, bots = arena.bot_count, "starting");

    let server = CirclefieldServer::builder()
        .bind(&addr)
        .arena(arena)
        .build()
        .await?;
    server.run().await
}

fn load_arena(path: &Path) -> Result<ArenaConfig, CirclefieldError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| CirclefieldError::Config(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&raw)
        .map_err(|e| CirclefieldError::Config(format!("{}: {e}", path.display())))
}
