//! Solidus node daemon.
//!
//! Proof-of-stake node with an integrated wallet, serving JSON-RPC.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod config;
mod node;
mod stun;

use config::NodeConfig;
use node::Node;

/// Solidus proof-of-stake node.
#[derive(Parser, Debug)]
#[command(name = "solidus-node")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "solidus.toml")]
    pub config: PathBuf,

    /// Data directory
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,

    /// Network to run on (mainnet, regtest)
    #[arg(short, long, default_value = "mainnet")]
    pub network: String,

    /// RPC bind address
    #[arg(long)]
    pub rpc_bind: Option<String>,

    /// Disable the staking loop
    #[arg(long)]
    pub no_staking: bool,

    /// Disable the external-IP probe
    #[arg(long)]
    pub no_stun: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Solidus node v{}", env!("CARGO_PKG_VERSION"));

    let config = NodeConfig::load(&args.config, &args)?;
    info!("Network: {}", config.network);
    info!("RPC: {}", config.rpc.bind_address);

    let node = Node::new(config)?;

    let shutdown_node = Arc::clone(&node);
    let shutdown_signal = async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received");
        shutdown_node.request_shutdown();
    };

    tokio::select! {
        result = Arc::clone(&node).run() => {
            if let Err(e) = result {
                tracing::error!("Node error: {}", e);
            }
        }
        _ = shutdown_signal => {}
    }

    // Give workers one tick to drain.
    node.request_shutdown();
    tokio::time::sleep(std::time::Duration::from_millis(600)).await;
    info!("Solidus node stopped");
    Ok(())
}
