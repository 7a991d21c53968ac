use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use storefront::config::Config;
use storefront::logging::init_tracing;
use storefront::server::Server;

/// Multi-tenant storefront API
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Address to listen on, overriding BIND_ADDR
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Environment file loaded before reading configuration
    #[arg(long)]
    env_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load environment variables from .env file
    match &args.env_file {
        Some(path) => {
            dotenv::from_path(path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
        }
        None => {
            dotenv::dotenv().ok();
        }
    }

    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }

    init_tracing(&config);

    tracing::info!("Starting storefront service");
    tracing::info!(
        "Configuration: bind_addr={}, app_env={}, cache_max_size={}",
        config.bind_addr,
        config.app_env,
        config.cache_max_size
    );

    Server::new(config).run().await.context("Server error")?;

    Ok(())
}
