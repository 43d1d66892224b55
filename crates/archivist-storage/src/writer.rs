//! Write buffer multiplexing index writes over rolling transactions.
//!
//! The state machine is the single producer. Writes accumulate in one open
//! transaction; when an entry overflows the byte budget the transaction is
//! committed on a blocking task and a fresh one takes its place. A
//! semaphore bounds the number of in-flight commits, and commit failures
//! are delivered lazily on the next `apply` or collected by `close`.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tracing::debug;

use archivist_types::{
    BlockId, Collection, Commit, Event, Guarantee, Header, Height, IndexError, IndexResult, Path,
    Payload, Seal, Transaction, TransactionId, TransactionResult,
};

use crate::codec::Codec;
use crate::database::{Database, StoreTransaction, DEFAULT_TRANSACTION_BUDGET};
use crate::keys;
use crate::operations::{self, KeyValue};

/// Write buffer configuration.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Maximum number of transactions committing in the background.
    pub concurrent_transactions: usize,
    /// Byte budget of a single transaction.
    pub transaction_budget: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            concurrent_transactions: 16,
            transaction_budget: DEFAULT_TRANSACTION_BUDGET,
        }
    }
}

/// Stateful index writer over the store.
pub struct Writer {
    db: Database,
    codec: Arc<Codec>,
    cfg: WriterConfig,
    tx: StoreTransaction,
    sema: Arc<Semaphore>,
    err_tx: mpsc::Sender<IndexError>,
    err_rx: mpsc::Receiver<IndexError>,
}

impl Writer {
    /// Create a writer over the given database and codec.
    pub fn new(db: Database, codec: Arc<Codec>, cfg: WriterConfig) -> Self {
        let (err_tx, err_rx) = mpsc::channel(cfg.concurrent_transactions.max(1));
        Self {
            tx: StoreTransaction::new(cfg.transaction_budget),
            sema: Arc::new(Semaphore::new(cfg.concurrent_transactions)),
            db,
            codec,
            cfg,
            err_tx,
            err_rx,
        }
    }

    /// Index the height of the first finalized block.
    pub async fn first(&mut self, height: Height) -> IndexResult<()> {
        let op = operations::save_first(&self.codec, height)?;
        self.apply(op).await
    }

    /// Index the height of the last finalized block.
    pub async fn last(&mut self, height: Height) -> IndexResult<()> {
        let op = operations::save_last(&self.codec, height)?;
        self.apply(op).await
    }

    /// Index the height for the given block id.
    pub async fn height_for_block(&mut self, block_id: &BlockId, height: Height) -> IndexResult<()> {
        let op = operations::save_height_for_block(&self.codec, block_id, height)?;
        self.apply(op).await
    }

    /// Index the header of the finalized block at the given height.
    pub async fn header(&mut self, height: Height, header: &Header) -> IndexResult<()> {
        let op = operations::save_header(&self.codec, height, header)?;
        self.apply(op).await
    }

    /// Index the state commitment reached by the finalized block at the
    /// given height, along with its reverse mapping.
    pub async fn commit(&mut self, height: Height, commit: &Commit) -> IndexResult<()> {
        let op = operations::save_commit(&self.codec, height, commit)?;
        self.apply(op).await?;
        let op = operations::save_height_for_commit(&self.codec, commit, height)?;
        self.apply(op).await
    }

    /// Index register payloads written at the given height.
    pub async fn payloads(
        &mut self,
        height: Height,
        paths: &[Path],
        payloads: &[Payload],
    ) -> IndexResult<()> {
        if paths.len() != payloads.len() {
            return Err(IndexError::Internal(format!(
                "mismatch between paths and payloads counts ({} != {})",
                paths.len(),
                payloads.len()
            )));
        }
        for (path, payload) in paths.iter().zip(payloads.iter()) {
            let op = operations::save_payload(&self.codec, height, path, payload)?;
            self.apply(op).await?;
        }
        Ok(())
    }

    /// Index the collections of the finalized block at the given height.
    pub async fn collections(
        &mut self,
        height: Height,
        collections: &[Collection],
    ) -> IndexResult<()> {
        let mut collection_ids = Vec::with_capacity(collections.len());
        for collection in collections {
            let collection_id = collection.id()?;
            let op = operations::save_collection(&self.codec, collection)?;
            self.apply(op).await?;
            let op = operations::save_transactions_for_collection(
                &self.codec,
                &collection_id,
                &collection.transaction_ids,
            )?;
            self.apply(op).await?;
            collection_ids.push(collection_id);
        }
        let op = operations::save_collections_for_height(&self.codec, height, &collection_ids)?;
        self.apply(op).await
    }

    /// Index the collection guarantees of a finalized block.
    pub async fn guarantees(&mut self, guarantees: &[Guarantee]) -> IndexResult<()> {
        for guarantee in guarantees {
            let op = operations::save_guarantee(&self.codec, guarantee)?;
            self.apply(op).await?;
        }
        Ok(())
    }

    /// Index the transactions of the finalized block at the given height.
    pub async fn transactions(
        &mut self,
        height: Height,
        transactions: &[Transaction],
    ) -> IndexResult<()> {
        let mut transaction_ids: Vec<TransactionId> = Vec::with_capacity(transactions.len());
        for transaction in transactions {
            let transaction_id = transaction.id()?;
            let op = operations::save_transaction(&self.codec, transaction)?;
            self.apply(op).await?;
            let op =
                operations::save_height_for_transaction(&self.codec, &transaction_id, height)?;
            self.apply(op).await?;
            transaction_ids.push(transaction_id);
        }
        let op = operations::save_transactions_for_height(&self.codec, height, &transaction_ids)?;
        self.apply(op).await
    }

    /// Index transaction results.
    pub async fn results(&mut self, results: &[TransactionResult]) -> IndexResult<()> {
        for result in results {
            let op = operations::save_result(&self.codec, result)?;
            self.apply(op).await?;
        }
        Ok(())
    }

    /// Index the events of the finalized block at the given height,
    /// bucketed by event-type hash.
    pub async fn events(&mut self, height: Height, events: &[Event]) -> IndexResult<()> {
        let mut buckets: BTreeMap<u64, Vec<Event>> = BTreeMap::new();
        for event in events {
            let hash = keys::event_type_hash(&event.event_type);
            buckets.entry(hash).or_default().push(event.clone());
        }
        for (type_hash, bucket) in &buckets {
            let op = operations::save_events(&self.codec, height, *type_hash, bucket)?;
            self.apply(op).await?;
        }
        Ok(())
    }

    /// Index the seals of the finalized block at the given height.
    pub async fn seals(&mut self, height: Height, seals: &[Seal]) -> IndexResult<()> {
        let mut seal_ids = Vec::with_capacity(seals.len());
        for seal in seals {
            let op = operations::save_seal(&self.codec, seal)?;
            self.apply(op).await?;
            seal_ids.push(seal.id()?);
        }
        let op = operations::save_seals_for_height(&self.codec, height, &seal_ids)?;
        self.apply(op).await
    }

    /// Stage one record, rolling the transaction over on budget overflow.
    async fn apply(&mut self, (key, value): KeyValue) -> IndexResult<()> {
        // Failures of earlier asynchronous commits surface here, before any
        // further writes are accepted.
        if let Ok(err) = self.err_rx.try_recv() {
            return Err(err);
        }

        if self.tx.put(&key, &value).is_err() {
            self.commit_current().await?;
            self.tx.put(&key, &value).map_err(|_| {
                IndexError::Internal(format!(
                    "operation larger than transaction budget ({} bytes)",
                    self.cfg.transaction_budget
                ))
            })?;
        }
        Ok(())
    }

    /// Commit the current transaction in the background and start a new one.
    async fn commit_current(&mut self) -> IndexResult<()> {
        let batch = self.tx.take();
        debug!(operations = batch.len(), "committing full transaction");

        let permit = Arc::clone(&self.sema)
            .acquire_owned()
            .await
            .map_err(|err| IndexError::Internal(format!("commit semaphore closed: {}", err)))?;

        let db = self.db.clone();
        let errors = self.err_tx.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(err) = db.write(batch) {
                let _ = errors.blocking_send(err);
            }
            drop(permit);
        });
        Ok(())
    }

    /// Commit the final transaction, drain all in-flight commits and report
    /// the union of their errors.
    pub async fn close(mut self) -> IndexResult<()> {
        let batch = self.tx.take();
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || db.write(batch))
            .await
            .map_err(|err| IndexError::Internal(format!("commit task failed: {}", err)))??;

        // Once every permit is back, all background commits have finished.
        let _permits = self
            .sema
            .acquire_many(self.cfg.concurrent_transactions as u32)
            .await
            .map_err(|err| IndexError::Internal(format!("commit semaphore closed: {}", err)))?;

        let mut failures = Vec::new();
        while let Ok(err) = self.err_rx.try_recv() {
            failures.push(err.to_string());
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(IndexError::Store(failures.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::RecordKind;
    use crate::operations::retrieve;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Database, Arc<Codec>) {
        let tmp = TempDir::new().unwrap();
        let db = Database::open(tmp.path()).unwrap();
        let codec = Arc::new(Codec::new().unwrap());
        (tmp, db, codec)
    }

    #[tokio::test]
    async fn test_writes_become_visible_after_close() {
        let (_tmp, db, codec) = setup();
        let mut writer = Writer::new(db.clone(), Arc::clone(&codec), WriterConfig::default());

        let header = Header {
            height: 5,
            parent_id: [1u8; 32],
            timestamp_ms: 10,
            payload_hash: [2u8; 32],
        };
        writer.first(5).await.unwrap();
        writer.header(5, &header).await.unwrap();
        writer.commit(5, &[3u8; 32]).await.unwrap();
        writer.last(5).await.unwrap();
        writer.close().await.unwrap();

        let first: Height =
            retrieve(&db, &codec, RecordKind::Other, &keys::first(), "first").unwrap();
        let last: Height = retrieve(&db, &codec, RecordKind::Other, &keys::last(), "last").unwrap();
        let decoded: Header =
            retrieve(&db, &codec, RecordKind::Header, &keys::header(5), "header").unwrap();
        let commit: Commit =
            retrieve(&db, &codec, RecordKind::Other, &keys::commit(5), "commit").unwrap();
        let height: Height = retrieve(
            &db,
            &codec,
            RecordKind::Other,
            &keys::height_for_commit(&[3u8; 32]),
            "height",
        )
        .unwrap();
        assert_eq!(first, 5);
        assert_eq!(last, 5);
        assert_eq!(decoded, header);
        assert_eq!(commit, [3u8; 32]);
        assert_eq!(height, 5);
    }

    #[tokio::test]
    async fn test_overflow_commits_and_retries() {
        let (_tmp, db, codec) = setup();
        let cfg = WriterConfig {
            concurrent_transactions: 2,
            // Tiny budget so nearly every payload rolls the transaction.
            transaction_budget: 128,
        };
        let mut writer = Writer::new(db.clone(), Arc::clone(&codec), cfg);

        let paths: Vec<Path> = (0u8..20).map(|i| [i; 32]).collect();
        let payloads: Vec<Payload> = (0u8..20)
            .map(|i| Payload::from_value(vec![i; 64]))
            .collect();
        writer.payloads(9, &paths, &payloads).await.unwrap();
        writer.close().await.unwrap();

        for (path, payload) in paths.iter().zip(payloads.iter()) {
            let decoded: Payload = retrieve(
                &db,
                &codec,
                RecordKind::Payload,
                &keys::payload(path, 9),
                "payload",
            )
            .unwrap();
            assert_eq!(&decoded, payload);
        }
    }

    #[tokio::test]
    async fn test_transactions_index_height_and_list() {
        let (_tmp, db, codec) = setup();
        let mut writer = Writer::new(db.clone(), Arc::clone(&codec), WriterConfig::default());

        let transaction = Transaction {
            payer: vec![0xAA; 8],
            nonce: 1,
            script: b"send".to_vec(),
            arguments: vec![],
            reference_block_id: [0u8; 32],
        };
        let transaction_id = transaction.id().unwrap();
        writer.transactions(12, &[transaction.clone()]).await.unwrap();
        writer.close().await.unwrap();

        let decoded: Transaction = retrieve(
            &db,
            &codec,
            RecordKind::Other,
            &keys::transaction(&transaction_id),
            "transaction",
        )
        .unwrap();
        assert_eq!(decoded, transaction);

        let height: Height = retrieve(
            &db,
            &codec,
            RecordKind::Other,
            &keys::height_for_transaction(&transaction_id),
            "height",
        )
        .unwrap();
        assert_eq!(height, 12);

        let ids: Vec<TransactionId> = retrieve(
            &db,
            &codec,
            RecordKind::Other,
            &keys::transactions_for_height(12),
            "transactions",
        )
        .unwrap();
        assert_eq!(ids, vec![transaction_id]);
    }
}
