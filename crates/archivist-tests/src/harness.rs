//! Test harness for integration tests.
//!
//! Provides a fully wired indexing engine over a temporary database, with
//! direct access to the upstream queues and the index reader.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc;

use archivist_chain::{BlockData, QueueChain, QueueFeeder};
use archivist_mapper::{Config as MapperConfig, Mapper, MapperHandle};
use archivist_storage::{Codec, Database, Reader, Writer, WriterConfig};
use archivist_types::{Height, IndexResult, RawTrieUpdate};

/// How long the engine gets to drain its queues before a test stops it.
pub const SETTLE: Duration = Duration::from_millis(500);

/// Deadline granted to the engine to wind down.
pub const STOP_DEADLINE: Duration = Duration::from_secs(5);

/// A running indexing engine over a temporary database.
pub struct TestEngine {
    tmp: TempDir,
    db: Database,
    codec: Arc<Codec>,
    reader: Reader,
    blocks: mpsc::Sender<BlockData>,
    updates: mpsc::Sender<RawTrieUpdate>,
    handle: MapperHandle,
}

impl TestEngine {
    /// Start an engine on a fresh temporary database.
    pub fn start(cfg: MapperConfig, root_height: Height) -> Self {
        let tmp = TempDir::new().expect("failed to create temp directory");
        let db = Database::open(tmp.path()).expect("failed to open database");
        Self::start_on(tmp, db, cfg, root_height)
    }

    /// Start an engine over an existing database, for restart scenarios.
    pub fn start_on(tmp: TempDir, db: Database, cfg: MapperConfig, root_height: Height) -> Self {
        let codec = Arc::new(Codec::new().expect("failed to build codec"));
        let (chain, blocks) = QueueChain::new(root_height, 64);
        let (feeder, updates) = QueueFeeder::new(64);
        let writer = Writer::new(db.clone(), Arc::clone(&codec), WriterConfig::default());
        let reader = Reader::new(db.clone(), Arc::clone(&codec));

        let handle = Mapper::spawn(
            cfg,
            Arc::new(chain),
            Arc::new(feeder),
            writer,
            reader.clone(),
        );

        Self {
            tmp,
            db,
            codec,
            reader,
            blocks,
            updates,
            handle,
        }
    }

    /// Read access to the index.
    pub fn reader(&self) -> Reader {
        self.reader.clone()
    }

    /// Push a finalized block to the chain source queue.
    pub async fn push_block(&self, block: BlockData) {
        self.blocks
            .send(block)
            .await
            .expect("chain queue closed");
    }

    /// Push a raw trie update to the feeder queue.
    pub async fn push_update(&self, update: RawTrieUpdate) {
        self.updates
            .send(update)
            .await
            .expect("feeder queue closed");
    }

    /// Give the engine time to drain its queues.
    pub async fn settle(&self) {
        tokio::time::sleep(SETTLE).await;
    }

    /// Stop the engine, committing all pending writes, and keep the
    /// database around for inspection or restart.
    pub async fn stop(self) -> (TempDir, Database, Reader, IndexResult<()>) {
        let result = self.handle.stop(STOP_DEADLINE).await;
        let reader = Reader::new(self.db.clone(), Arc::clone(&self.codec));
        (self.tmp, self.db, reader, result)
    }
}

/// A mapper config suited to fast test runs.
pub fn test_config() -> MapperConfig {
    MapperConfig {
        wait_interval: Duration::from_millis(5),
        ..MapperConfig::default()
    }
}
