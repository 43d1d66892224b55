//! Chain source: finalized protocol data by height.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use archivist_types::{
    Collection, Commit, Event, Guarantee, Header, Height, IndexError, IndexResult, Seal,
    Transaction, TransactionResult,
};

/// Everything the upstream follower produces for one finalized block.
#[derive(Debug, Clone)]
pub struct BlockData {
    /// Header of the finalized block.
    pub header: Header,
    /// State commitment after executing the block.
    pub commit: Commit,
    /// Collection guarantees included in the block.
    pub guarantees: Vec<Guarantee>,
    /// Seals included in the block.
    pub seals: Vec<Seal>,
    /// Collections executed in the block.
    pub collections: Vec<Collection>,
    /// Transactions executed in the block.
    pub transactions: Vec<Transaction>,
    /// Results of the executed transactions.
    pub results: Vec<TransactionResult>,
    /// Events emitted during execution.
    pub events: Vec<Event>,
}

impl BlockData {
    /// Height of the finalized block.
    pub fn height(&self) -> Height {
        self.header.height
    }
}

/// Pull access to finalized protocol data.
///
/// Record getters return [`IndexError::Unavailable`] while the chain has
/// not yet finalized (or delivered) the requested height.
pub trait Chain: Send + Sync {
    /// Height of the root block the index starts from.
    fn root(&self) -> IndexResult<Height>;
    /// Header of the finalized block at the height.
    fn header(&self, height: Height) -> IndexResult<Header>;
    /// State commitment of the finalized block at the height.
    fn commit(&self, height: Height) -> IndexResult<Commit>;
    /// Collection guarantees of the finalized block at the height.
    fn guarantees(&self, height: Height) -> IndexResult<Vec<Guarantee>>;
    /// Seals of the finalized block at the height.
    fn seals(&self, height: Height) -> IndexResult<Vec<Seal>>;
    /// Collections of the finalized block at the height.
    fn collections(&self, height: Height) -> IndexResult<Vec<Collection>>;
    /// Transactions of the finalized block at the height.
    fn transactions(&self, height: Height) -> IndexResult<Vec<Transaction>>;
    /// Transaction results of the finalized block at the height.
    fn results(&self, height: Height) -> IndexResult<Vec<TransactionResult>>;
    /// Events of the finalized block at the height.
    fn events(&self, height: Height) -> IndexResult<Vec<Event>>;
}

struct QueueChainInner {
    receiver: mpsc::Receiver<BlockData>,
    blocks: BTreeMap<Height, BlockData>,
}

/// Queue-backed chain source.
///
/// The upstream follower pushes finalized blocks into a bounded queue; the
/// state machine polls this source, which drains ready blocks into a
/// height-keyed cache on every query. Heights already indexed are evicted
/// as the queries move forward.
pub struct QueueChain {
    root: Height,
    inner: Mutex<QueueChainInner>,
}

impl QueueChain {
    /// Create a queue chain starting at the given root height, returning
    /// the sender side for the upstream follower.
    pub fn new(root: Height, capacity: usize) -> (Self, mpsc::Sender<BlockData>) {
        let (sender, receiver) = mpsc::channel(capacity);
        let chain = Self {
            root,
            inner: Mutex::new(QueueChainInner {
                receiver,
                blocks: BTreeMap::new(),
            }),
        };
        (chain, sender)
    }

    /// Look up a block, draining any newly delivered blocks first.
    fn with_block<T>(
        &self,
        height: Height,
        read: impl FnOnce(&BlockData) -> T,
    ) -> IndexResult<T> {
        let mut inner = self.inner.lock();

        while let Ok(block) = inner.receiver.try_recv() {
            if block.height() < self.root {
                warn!(
                    height = block.height(),
                    root = self.root,
                    "discarding finalized block below root height"
                );
                continue;
            }
            debug!(height = block.height(), "buffered finalized block");
            inner.blocks.insert(block.height(), block);
        }

        // Queries move forward monotonically, so anything below the
        // requested height has been fully indexed and can go.
        let stale: Vec<Height> = inner
            .blocks
            .range(..height)
            .map(|(cached, _)| *cached)
            .collect();
        for cached in stale {
            inner.blocks.remove(&cached);
        }

        match inner.blocks.get(&height) {
            Some(block) => Ok(read(block)),
            None => Err(IndexError::Unavailable),
        }
    }
}

impl Chain for QueueChain {
    fn root(&self) -> IndexResult<Height> {
        Ok(self.root)
    }

    fn header(&self, height: Height) -> IndexResult<Header> {
        self.with_block(height, |block| block.header.clone())
    }

    fn commit(&self, height: Height) -> IndexResult<Commit> {
        self.with_block(height, |block| block.commit)
    }

    fn guarantees(&self, height: Height) -> IndexResult<Vec<Guarantee>> {
        self.with_block(height, |block| block.guarantees.clone())
    }

    fn seals(&self, height: Height) -> IndexResult<Vec<Seal>> {
        self.with_block(height, |block| block.seals.clone())
    }

    fn collections(&self, height: Height) -> IndexResult<Vec<Collection>> {
        self.with_block(height, |block| block.collections.clone())
    }

    fn transactions(&self, height: Height) -> IndexResult<Vec<Transaction>> {
        self.with_block(height, |block| block.transactions.clone())
    }

    fn results(&self, height: Height) -> IndexResult<Vec<TransactionResult>> {
        self.with_block(height, |block| block.results.clone())
    }

    fn events(&self, height: Height) -> IndexResult<Vec<Event>> {
        self.with_block(height, |block| block.events.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(height: Height) -> BlockData {
        BlockData {
            header: Header {
                height,
                parent_id: [0u8; 32],
                timestamp_ms: height * 1000,
                payload_hash: [1u8; 32],
            },
            commit: [height as u8; 32],
            guarantees: Vec::new(),
            seals: Vec::new(),
            collections: Vec::new(),
            transactions: Vec::new(),
            results: Vec::new(),
            events: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_unavailable_until_pushed() {
        let (chain, sender) = QueueChain::new(100, 8);

        assert!(matches!(
            chain.header(100).unwrap_err(),
            IndexError::Unavailable
        ));

        sender.send(block(100)).await.unwrap();
        assert_eq!(chain.header(100).unwrap().height, 100);
        assert_eq!(chain.commit(100).unwrap(), [100u8; 32]);
    }

    #[tokio::test]
    async fn test_out_of_order_delivery_is_buffered() {
        let (chain, sender) = QueueChain::new(100, 8);
        sender.send(block(101)).await.unwrap();
        sender.send(block(100)).await.unwrap();

        assert_eq!(chain.header(100).unwrap().height, 100);
        assert_eq!(chain.header(101).unwrap().height, 101);
    }

    #[tokio::test]
    async fn test_blocks_below_root_are_discarded() {
        let (chain, sender) = QueueChain::new(100, 8);
        sender.send(block(99)).await.unwrap();

        assert!(matches!(
            chain.header(99).unwrap_err(),
            IndexError::Unavailable
        ));
    }

    #[tokio::test]
    async fn test_stale_heights_are_evicted() {
        let (chain, sender) = QueueChain::new(100, 8);
        sender.send(block(100)).await.unwrap();
        sender.send(block(101)).await.unwrap();

        assert_eq!(chain.header(101).unwrap().height, 101);
        // Querying 101 evicted 100.
        assert!(matches!(
            chain.header(100).unwrap_err(),
            IndexError::Unavailable
        ));
    }

    #[tokio::test]
    async fn test_root_height() {
        let (chain, _sender) = QueueChain::new(100, 8);
        assert_eq!(chain.root().unwrap(), 100);
    }
}
