//! Trie-update feeder: execution-state deltas from the write-ahead log.

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use archivist_types::{IndexError, IndexResult, RawTrieUpdate, TrieUpdate};

/// Pull access to the stream of execution-state trie updates.
pub trait Feeder: Send + Sync {
    /// The next trie update, or [`IndexError::Unavailable`] when the
    /// execution stream has not produced one yet.
    fn update(&self) -> IndexResult<TrieUpdate>;
}

/// Queue-backed feeder.
///
/// The upstream log reader pushes raw records into a bounded queue; each
/// record is validated here before it reaches the state machine. A digest
/// that is not literally 32 bytes is a fatal schema mismatch.
pub struct QueueFeeder {
    receiver: Mutex<mpsc::Receiver<RawTrieUpdate>>,
}

impl QueueFeeder {
    /// Create a queue feeder, returning the sender side for the upstream
    /// log reader.
    pub fn new(capacity: usize) -> (Self, mpsc::Sender<RawTrieUpdate>) {
        let (sender, receiver) = mpsc::channel(capacity);
        let feeder = Self {
            receiver: Mutex::new(receiver),
        };
        (feeder, sender)
    }
}

impl Feeder for QueueFeeder {
    fn update(&self) -> IndexResult<TrieUpdate> {
        let raw = match self.receiver.lock().try_recv() {
            Ok(raw) => raw,
            // An empty or closed queue both mean there is nothing to apply
            // right now; the state machine keeps polling.
            Err(_) => return Err(IndexError::Unavailable),
        };
        let update = TrieUpdate::try_from(raw)?;
        debug!(
            root = %hex::encode(update.root),
            paths = update.paths.len(),
            "validated trie update"
        );
        Ok(update)
    }
}
