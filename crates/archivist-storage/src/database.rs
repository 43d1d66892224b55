//! RocksDB adapter and size-budgeted write transactions.

use std::path::Path;
use std::sync::Arc;

use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use thiserror::Error;
use tracing::{debug, info};

use archivist_types::{IndexError, IndexResult};

/// Default byte budget of a single write transaction (4 MiB).
pub const DEFAULT_TRANSACTION_BUDGET: usize = 4 * 1024 * 1024;

// Per-entry overhead estimate used when checking the budget.
const ENTRY_OVERHEAD: usize = 12;

/// Scan direction for iterators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDirection {
    /// Ascending key order.
    Forward,
    /// Descending key order, starting at the largest key not above the
    /// start key.
    Reverse,
}

/// RocksDB database wrapper.
///
/// The index uses a single keyspace; logical partitioning is done by the
/// one-byte key prefix of the key schema. Reads never block writes.
#[derive(Clone)]
pub struct Database {
    db: Arc<DB>,
}

impl Database {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> IndexResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening index database");

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_max_open_files(256);
        opts.set_keep_log_file_num(1);
        opts.set_max_total_wal_size(64 * 1024 * 1024);
        // Values are already zstd-compressed by the codec.
        opts.set_compression_type(rocksdb::DBCompressionType::None);

        let db = DB::open(&opts, path).map_err(IndexError::store)?;
        debug!("index database opened");

        Ok(Self { db: Arc::new(db) })
    }

    /// Get a value by key.
    pub fn get(&self, key: &[u8]) -> IndexResult<Option<Vec<u8>>> {
        self.db.get(key).map_err(IndexError::store)
    }

    /// Atomically write a batch.
    pub fn write(&self, batch: WriteBatch) -> IndexResult<()> {
        self.db.write(batch).map_err(IndexError::store)
    }

    /// Iterate key-value pairs starting at `start` in the given direction.
    ///
    /// The iteration is unbounded; callers stop once keys leave their
    /// prefix. In reverse mode the cursor starts at the largest key that is
    /// not greater than `start`.
    pub fn iter_from(
        &self,
        start: &[u8],
        direction: ScanDirection,
    ) -> impl Iterator<Item = (Vec<u8>, Vec<u8>)> + '_ {
        let mode = match direction {
            ScanDirection::Forward => IteratorMode::From(start, Direction::Forward),
            ScanDirection::Reverse => IteratorMode::From(start, Direction::Reverse),
        };
        self.db
            .iterator(mode)
            .flatten()
            .map(|(key, value)| (key.to_vec(), value.to_vec()))
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> IndexResult<()> {
        self.db.flush().map_err(IndexError::store)
    }
}

/// Returned by [`StoreTransaction::put`] when the entry would push the
/// transaction over its byte budget.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("transaction byte budget exceeded")]
pub struct TransactionFull;

/// A write transaction with an explicit byte budget.
///
/// The batch stays untouched when `put` reports [`TransactionFull`], so the
/// caller can commit the batch as-is and retry the same entry against a
/// fresh transaction.
pub struct StoreTransaction {
    batch: WriteBatch,
    size: usize,
    budget: usize,
}

impl StoreTransaction {
    /// Create an empty transaction with the given byte budget.
    pub fn new(budget: usize) -> Self {
        Self {
            batch: WriteBatch::default(),
            size: 0,
            budget,
        }
    }

    /// Stage a put.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), TransactionFull> {
        let entry = key.len() + value.len() + ENTRY_OVERHEAD;
        // A single oversized entry still has to fit somewhere; only refuse
        // when the transaction already holds data.
        if !self.is_empty() && self.size + entry > self.budget {
            return Err(TransactionFull);
        }
        self.batch.put(key, value);
        self.size += entry;
        Ok(())
    }

    /// Number of staged operations.
    pub fn len(&self) -> usize {
        self.batch.len()
    }

    /// Whether no operations are staged.
    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    /// Take the staged batch, leaving a fresh transaction with the same
    /// budget behind.
    pub fn take(&mut self) -> WriteBatch {
        self.size = 0;
        std::mem::take(&mut self.batch)
    }
}
