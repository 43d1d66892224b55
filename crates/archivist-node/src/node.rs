//! Node assembly and lifecycle.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{error, info};

use archivist_chain::{BlockData, QueueChain, QueueFeeder};
use archivist_mapper::{Config as MapperConfig, Mapper};
use archivist_storage::{Codec, Database, Reader, Writer, WriterConfig};
use archivist_types::RawTrieUpdate;

use crate::config::NodeConfig;

/// A fully wired indexer node.
///
/// The node owns the store, the codec and the running state machine, and
/// exposes the queue endpoints an upstream follower pushes finalized blocks
/// and trie updates into.
pub struct Node {
    config: NodeConfig,
    reader: Reader,
    blocks: mpsc::Sender<BlockData>,
    updates: mpsc::Sender<RawTrieUpdate>,
    chain: Arc<QueueChain>,
    feeder: Arc<QueueFeeder>,
    writer: Option<Writer>,
}

impl Node {
    /// Open the store and wire up the engine.
    pub fn new(config: NodeConfig) -> Result<Self> {
        let db = Database::open(&config.data_dir).context("Failed to open index database")?;
        let codec = Arc::new(Codec::new().context("Failed to build codec")?);

        let (chain, blocks) = QueueChain::new(config.root_height, config.queue_capacity);
        let (feeder, updates) = QueueFeeder::new(config.queue_capacity);

        let writer = Writer::new(
            db.clone(),
            Arc::clone(&codec),
            WriterConfig {
                concurrent_transactions: config.concurrent_transactions,
                ..WriterConfig::default()
            },
        );
        let reader = Reader::new(db, codec);

        Ok(Self {
            config,
            reader,
            blocks,
            updates,
            chain: Arc::new(chain),
            feeder: Arc::new(feeder),
            writer: Some(writer),
        })
    }

    /// Read access to the index, for embedding API facades.
    pub fn reader(&self) -> Reader {
        self.reader.clone()
    }

    /// Queue endpoint for finalized blocks.
    pub fn block_sender(&self) -> mpsc::Sender<BlockData> {
        self.blocks.clone()
    }

    /// Queue endpoint for raw trie updates.
    pub fn update_sender(&self) -> mpsc::Sender<RawTrieUpdate> {
        self.updates.clone()
    }

    /// Run the indexer until ctrl-c.
    pub async fn run(mut self) -> Result<()> {
        let writer = self
            .writer
            .take()
            .context("Node is already running")?;

        let mapper_config = MapperConfig {
            wait_interval: Duration::from_millis(self.config.wait_interval_ms),
            index_commit: self.config.index.commits,
            index_header: self.config.index.headers,
            index_collections: self.config.index.collections,
            index_guarantees: self.config.index.guarantees,
            index_transactions: self.config.index.transactions,
            index_results: self.config.index.results,
            index_events: self.config.index.events,
            index_payloads: self.config.index.payloads,
            index_seals: self.config.index.seals,
            ..MapperConfig::default()
        };

        let chain: Arc<dyn archivist_chain::Chain> = Arc::clone(&self.chain);
        let feeder: Arc<dyn archivist_chain::Feeder> = Arc::clone(&self.feeder);
        let handle = Mapper::spawn(mapper_config, chain, feeder, writer, self.reader.clone());
        info!(root_height = self.config.root_height, "indexer running");

        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for shutdown signal")?;
        info!("shutdown signal received");

        let deadline = Duration::from_secs(self.config.shutdown_deadline_secs);
        if let Err(err) = handle.stop(deadline).await {
            error!(error = %err, "indexer shutdown failed");
            return Err(err.into());
        }

        Ok(())
    }
}
