//! Archivist indexer daemon.
//!
//! This is the main entry point for the archivist-node binary.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod config;
mod node;

use config::NodeConfig;
use node::Node;

/// Historical state indexer for a finalized blockchain.
#[derive(Parser, Debug)]
#[command(name = "archivist-node")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "archivist-node.toml")]
    config: PathBuf,

    /// Data directory
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Height of the root block the index starts from
    #[arg(long)]
    root_height: Option<u64>,

    /// Wait interval in milliseconds when upstream data is unavailable
    #[arg(long)]
    wait_interval_ms: Option<u64>,

    /// Maximum concurrent store transactions
    #[arg(long)]
    concurrent_transactions: Option<usize>,

    /// Skip register payload indexing
    #[arg(long)]
    skip_registers: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level: Level = args.log_level.parse().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!(version = env!("CARGO_PKG_VERSION"), "starting archivist node");

    let config = NodeConfig::load(&args.config, &args)?;
    let node = Node::new(config)?;
    node.run().await?;

    info!("archivist node stopped");
    Ok(())
}
