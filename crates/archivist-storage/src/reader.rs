//! Stateless read path over the index store.

use std::collections::HashSet;
use std::sync::Arc;

use archivist_types::{
    BlockId, Collection, CollectionId, Commit, Event, Guarantee, Header, Height, IndexError,
    IndexResult, Path, Payload, Seal, SealId, Transaction, TransactionId, TransactionResult,
};

use crate::codec::{Codec, RecordKind};
use crate::database::{Database, ScanDirection};
use crate::keys;
use crate::operations::retrieve;

/// Read access to the index.
///
/// All queries translate directly into key-schema lookups; the reader holds
/// no state beyond the database and codec handles and can be cloned freely
/// across concurrent tasks.
#[derive(Clone)]
pub struct Reader {
    db: Database,
    codec: Arc<Codec>,
}

impl Reader {
    /// Create a reader over the given database and codec.
    pub fn new(db: Database, codec: Arc<Codec>) -> Self {
        Self { db, codec }
    }

    /// The first indexed height.
    pub fn first(&self) -> IndexResult<Height> {
        retrieve(
            &self.db,
            &self.codec,
            RecordKind::Other,
            &keys::first(),
            "first indexed height",
        )
    }

    /// The last indexed height.
    pub fn last(&self) -> IndexResult<Height> {
        retrieve(
            &self.db,
            &self.codec,
            RecordKind::Other,
            &keys::last(),
            "last indexed height",
        )
    }

    /// The header of the finalized block at the given height.
    pub fn header(&self, height: Height) -> IndexResult<Header> {
        retrieve(
            &self.db,
            &self.codec,
            RecordKind::Header,
            &keys::header(height),
            &format!("unknown block height: {}", height),
        )
    }

    /// The state commitment after the finalized block at the given height.
    pub fn commit(&self, height: Height) -> IndexResult<Commit> {
        retrieve(
            &self.db,
            &self.codec,
            RecordKind::Other,
            &keys::commit(height),
            &format!("unknown block height: {}", height),
        )
    }

    /// The height of the block with the given id.
    pub fn height_for_block(&self, block_id: &BlockId) -> IndexResult<Height> {
        retrieve(
            &self.db,
            &self.codec,
            RecordKind::Other,
            &keys::height_for_block(block_id),
            &format!("unknown block: {}", hex::encode(block_id)),
        )
    }

    /// The height of the block that produced the given state commitment.
    pub fn height_for_commit(&self, commit: &Commit) -> IndexResult<Height> {
        retrieve(
            &self.db,
            &self.codec,
            RecordKind::Other,
            &keys::height_for_commit(commit),
            &format!("unknown commit: {}", hex::encode(commit)),
        )
    }

    /// The height of the block containing the given transaction.
    pub fn height_for_transaction(&self, transaction_id: &TransactionId) -> IndexResult<Height> {
        retrieve(
            &self.db,
            &self.codec,
            RecordKind::Other,
            &keys::height_for_transaction(transaction_id),
            &format!("unknown transaction: {}", hex::encode(transaction_id)),
        )
    }

    /// The events emitted at the given height, optionally filtered by type.
    ///
    /// An empty filter returns all events. The type-hash segment in the key
    /// only narrows the scan; decoded events are filtered again by the full
    /// type string so hash collisions never leak foreign events.
    pub fn events(&self, height: Height, types: &[String]) -> IndexResult<Vec<Event>> {
        let lookup: HashSet<u64> = types
            .iter()
            .map(|event_type| keys::event_type_hash(event_type))
            .collect();

        let prefix = keys::events_prefix(height);
        let mut events = Vec::new();
        for (key, value) in self.db.iter_from(&prefix, ScanDirection::Forward) {
            if !key.starts_with(&prefix) {
                break;
            }
            if key.len() < keys::EVENTS_TYPE_HASH_OFFSET + 8 {
                return Err(IndexError::SchemaMismatch(format!(
                    "malformed events key: {}",
                    hex::encode(&key)
                )));
            }
            let mut hash_bytes = [0u8; 8];
            hash_bytes.copy_from_slice(
                &key[keys::EVENTS_TYPE_HASH_OFFSET..keys::EVENTS_TYPE_HASH_OFFSET + 8],
            );
            let type_hash = u64::from_be_bytes(hash_bytes);
            if !lookup.is_empty() && !lookup.contains(&type_hash) {
                continue;
            }
            let batch: Vec<Event> = self.codec.decode(RecordKind::Event, &value)?;
            events.extend(batch);
        }

        if !types.is_empty() {
            events.retain(|event| types.iter().any(|requested| requested == &event.event_type));
        }

        Ok(events)
    }

    /// The values of the given registers as of the given height.
    ///
    /// For each path the result is the payload written at the greatest
    /// height not above `height`, or `None` if the register had not been
    /// written yet. Results come back in input order.
    pub fn registers(
        &self,
        height: Height,
        paths: &[Path],
    ) -> IndexResult<Vec<Option<Payload>>> {
        let mut values = Vec::with_capacity(paths.len());
        for path in paths {
            let seek = keys::payload(path, height);
            let prefix = keys::payload_prefix(path);
            let found = self
                .db
                .iter_from(&seek, ScanDirection::Reverse)
                .next()
                .filter(|(key, _)| key.starts_with(&prefix))
                .map(|(_, value)| self.codec.decode(RecordKind::Payload, &value))
                .transpose()?;
            values.push(found);
        }
        Ok(values)
    }

    /// The transaction with the given id.
    pub fn transaction(&self, transaction_id: &TransactionId) -> IndexResult<Transaction> {
        retrieve(
            &self.db,
            &self.codec,
            RecordKind::Other,
            &keys::transaction(transaction_id),
            &format!("unknown transaction: {}", hex::encode(transaction_id)),
        )
    }

    /// The ids of the transactions included in the given block.
    pub fn transactions(&self, block_id: &BlockId) -> IndexResult<Vec<TransactionId>> {
        let height = self.height_for_block(block_id)?;
        retrieve(
            &self.db,
            &self.codec,
            RecordKind::Other,
            &keys::transactions_for_height(height),
            &format!("unknown block: {}", hex::encode(block_id)),
        )
    }

    /// The collection with the given id.
    pub fn collection(&self, collection_id: &CollectionId) -> IndexResult<Collection> {
        retrieve(
            &self.db,
            &self.codec,
            RecordKind::Other,
            &keys::collection(collection_id),
            &format!("unknown collection: {}", hex::encode(collection_id)),
        )
    }

    /// The ids of the collections included in the given block.
    pub fn collections(&self, block_id: &BlockId) -> IndexResult<Vec<CollectionId>> {
        let height = self.height_for_block(block_id)?;
        retrieve(
            &self.db,
            &self.codec,
            RecordKind::Other,
            &keys::collections_for_height(height),
            &format!("unknown block: {}", hex::encode(block_id)),
        )
    }

    /// The guarantee for the given collection.
    pub fn guarantee(&self, collection_id: &CollectionId) -> IndexResult<Guarantee> {
        retrieve(
            &self.db,
            &self.codec,
            RecordKind::Other,
            &keys::guarantee(collection_id),
            &format!("unknown collection: {}", hex::encode(collection_id)),
        )
    }

    /// The seal with the given id.
    pub fn seal(&self, seal_id: &SealId) -> IndexResult<Seal> {
        retrieve(
            &self.db,
            &self.codec,
            RecordKind::Other,
            &keys::seal(seal_id),
            &format!("unknown seal: {}", hex::encode(seal_id)),
        )
    }

    /// The ids of the seals included at the given height.
    pub fn seals(&self, height: Height) -> IndexResult<Vec<SealId>> {
        retrieve(
            &self.db,
            &self.codec,
            RecordKind::Other,
            &keys::seals_for_height(height),
            &format!("unknown block height: {}", height),
        )
    }

    /// The result of the transaction with the given id.
    pub fn result(&self, transaction_id: &TransactionId) -> IndexResult<TransactionResult> {
        retrieve(
            &self.db,
            &self.codec,
            RecordKind::Other,
            &keys::result(transaction_id),
            &format!("unknown transaction: {}", hex::encode(transaction_id)),
        )
    }
}
