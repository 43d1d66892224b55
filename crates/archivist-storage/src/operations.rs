//! Save and retrieve primitives over the key schema.
//!
//! Each save builds the `(key, value)` pair for one logical record; the
//! write buffer decides how pairs are grouped into transactions. Retrieval
//! is a single generic lookup since every read is "get key, decompress,
//! decode".

use serde::de::DeserializeOwned;

use archivist_types::{
    BlockId, Collection, CollectionId, Commit, Event, Guarantee, Header, Height, IndexError,
    IndexResult, Path, Payload, Seal, SealId, Transaction, TransactionId, TransactionResult,
};

use crate::codec::{Codec, RecordKind};
use crate::database::Database;
use crate::keys;

/// A staged index record.
pub type KeyValue = (Vec<u8>, Vec<u8>);

/// Stage the first indexed height.
pub fn save_first(codec: &Codec, height: Height) -> IndexResult<KeyValue> {
    Ok((keys::first(), codec.encode(RecordKind::Other, &height)?))
}

/// Stage the last indexed height.
pub fn save_last(codec: &Codec, height: Height) -> IndexResult<KeyValue> {
    Ok((keys::last(), codec.encode(RecordKind::Other, &height)?))
}

/// Stage the header of a height.
pub fn save_header(codec: &Codec, height: Height, header: &Header) -> IndexResult<KeyValue> {
    Ok((keys::header(height), codec.encode(RecordKind::Header, header)?))
}

/// Stage the state commitment of a height.
pub fn save_commit(codec: &Codec, height: Height, commit: &Commit) -> IndexResult<KeyValue> {
    Ok((keys::commit(height), codec.encode(RecordKind::Other, commit)?))
}

/// Stage the block-id-to-height mapping.
pub fn save_height_for_block(
    codec: &Codec,
    block_id: &BlockId,
    height: Height,
) -> IndexResult<KeyValue> {
    Ok((
        keys::height_for_block(block_id),
        codec.encode(RecordKind::Other, &height)?,
    ))
}

/// Stage the commit-to-height mapping.
pub fn save_height_for_commit(
    codec: &Codec,
    commit: &Commit,
    height: Height,
) -> IndexResult<KeyValue> {
    Ok((
        keys::height_for_commit(commit),
        codec.encode(RecordKind::Other, &height)?,
    ))
}

/// Stage one event bucket of a height.
pub fn save_events(
    codec: &Codec,
    height: Height,
    type_hash: u64,
    events: &[Event],
) -> IndexResult<KeyValue> {
    Ok((
        keys::events(height, type_hash),
        codec.encode(RecordKind::Event, &events)?,
    ))
}

/// Stage the payload written on a path at a height.
pub fn save_payload(
    codec: &Codec,
    height: Height,
    path: &Path,
    payload: &Payload,
) -> IndexResult<KeyValue> {
    Ok((
        keys::payload(path, height),
        codec.encode(RecordKind::Payload, payload)?,
    ))
}

/// Stage a transaction record.
pub fn save_transaction(codec: &Codec, transaction: &Transaction) -> IndexResult<KeyValue> {
    let transaction_id = transaction.id()?;
    Ok((
        keys::transaction(&transaction_id),
        codec.encode(RecordKind::Other, transaction)?,
    ))
}

/// Stage the transaction-id-to-height mapping.
pub fn save_height_for_transaction(
    codec: &Codec,
    transaction_id: &TransactionId,
    height: Height,
) -> IndexResult<KeyValue> {
    Ok((
        keys::height_for_transaction(transaction_id),
        codec.encode(RecordKind::Other, &height)?,
    ))
}

/// Stage the transaction-id list of a height.
pub fn save_transactions_for_height(
    codec: &Codec,
    height: Height,
    transaction_ids: &[TransactionId],
) -> IndexResult<KeyValue> {
    Ok((
        keys::transactions_for_height(height),
        codec.encode(RecordKind::Other, &transaction_ids)?,
    ))
}

/// Stage a collection record.
pub fn save_collection(codec: &Codec, collection: &Collection) -> IndexResult<KeyValue> {
    let collection_id = collection.id()?;
    Ok((
        keys::collection(&collection_id),
        codec.encode(RecordKind::Other, collection)?,
    ))
}

/// Stage the transaction-id list of a collection.
pub fn save_transactions_for_collection(
    codec: &Codec,
    collection_id: &CollectionId,
    transaction_ids: &[TransactionId],
) -> IndexResult<KeyValue> {
    Ok((
        keys::transactions_for_collection(collection_id),
        codec.encode(RecordKind::Other, &transaction_ids)?,
    ))
}

/// Stage the collection-id list of a height.
pub fn save_collections_for_height(
    codec: &Codec,
    height: Height,
    collection_ids: &[CollectionId],
) -> IndexResult<KeyValue> {
    Ok((
        keys::collections_for_height(height),
        codec.encode(RecordKind::Other, &collection_ids)?,
    ))
}

/// Stage a guarantee record.
pub fn save_guarantee(codec: &Codec, guarantee: &Guarantee) -> IndexResult<KeyValue> {
    Ok((
        keys::guarantee(&guarantee.collection_id),
        codec.encode(RecordKind::Other, guarantee)?,
    ))
}

/// Stage a seal record.
pub fn save_seal(codec: &Codec, seal: &Seal) -> IndexResult<KeyValue> {
    let seal_id = seal.id()?;
    Ok((keys::seal(&seal_id), codec.encode(RecordKind::Other, seal)?))
}

/// Stage the seal-id list of a height.
pub fn save_seals_for_height(
    codec: &Codec,
    height: Height,
    seal_ids: &[SealId],
) -> IndexResult<KeyValue> {
    Ok((
        keys::seals_for_height(height),
        codec.encode(RecordKind::Other, &seal_ids)?,
    ))
}

/// Stage a transaction result record.
pub fn save_result(codec: &Codec, result: &TransactionResult) -> IndexResult<KeyValue> {
    Ok((
        keys::result(&result.transaction_id),
        codec.encode(RecordKind::Other, result)?,
    ))
}

/// Look up a key and decode its value, reporting `what` when absent.
pub fn retrieve<T: DeserializeOwned>(
    db: &Database,
    codec: &Codec,
    kind: RecordKind,
    key: &[u8],
    what: &str,
) -> IndexResult<T> {
    let value = db
        .get(key)?
        .ok_or_else(|| IndexError::NotFound(what.to_string()))?;
    codec.decode(kind, &value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocksdb::WriteBatch;
    use tempfile::TempDir;

    #[test]
    fn test_save_then_retrieve() {
        let tmp = TempDir::new().unwrap();
        let db = Database::open(tmp.path()).unwrap();
        let codec = Codec::new().unwrap();

        let header = Header {
            height: 7,
            parent_id: [4u8; 32],
            timestamp_ms: 1,
            payload_hash: [5u8; 32],
        };
        let (key, value) = save_header(&codec, 7, &header).unwrap();
        let mut batch = WriteBatch::default();
        batch.put(&key, &value);
        db.write(batch).unwrap();

        let decoded: Header =
            retrieve(&db, &codec, RecordKind::Header, &keys::header(7), "header").unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_retrieve_missing_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let db = Database::open(tmp.path()).unwrap();
        let codec = Codec::new().unwrap();

        let err = retrieve::<Header>(&db, &codec, RecordKind::Header, &keys::header(9), "header")
            .unwrap_err();
        assert!(matches!(err, IndexError::NotFound(_)));
    }
}
