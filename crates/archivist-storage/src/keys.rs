//! Byte-key schema of the index.
//!
//! Each logical record maps to a key made of a one-byte prefix followed by
//! big-endian segments. Big-endian heights are mandatory: they make
//! lexicographic order equal numeric order, which enables the reverse scan
//! that answers "latest payload at or below height h".

use std::hash::Hasher;

use twox_hash::XxHash64;

use archivist_types::{
    BlockId, CollectionId, Commit, Height, Path, SealId, TransactionId,
};

/// First indexed height.
pub const FIRST: u8 = 1;
/// Last indexed height.
pub const LAST: u8 = 2;
/// Block header at a height.
pub const HEADER: u8 = 3;
/// State commitment at a height.
pub const COMMIT: u8 = 4;
/// Event batch for a (height, type-hash) bucket.
pub const EVENTS: u8 = 5;
/// Register payload at a (path, height).
pub const PAYLOAD: u8 = 6;
/// Height of a block id.
pub const HEIGHT_FOR_BLOCK: u8 = 7;
/// Height of a state commitment.
pub const HEIGHT_FOR_COMMIT: u8 = 8;
/// Transaction by id.
pub const TRANSACTION: u8 = 9;
/// Height of a transaction id.
pub const HEIGHT_FOR_TRANSACTION: u8 = 10;
/// Transaction ids included at a height.
pub const TRANSACTIONS_FOR_HEIGHT: u8 = 11;
/// Collection by id.
pub const COLLECTION: u8 = 12;
/// Transaction ids of a collection.
pub const TRANSACTIONS_FOR_COLLECTION: u8 = 13;
/// Collection ids included at a height.
pub const COLLECTIONS_FOR_HEIGHT: u8 = 14;
/// Guarantee by collection id.
pub const GUARANTEE: u8 = 15;
/// Seal by id.
pub const SEAL: u8 = 16;
/// Seal ids included at a height.
pub const SEALS_FOR_HEIGHT: u8 = 17;
/// Transaction result by transaction id.
pub const RESULT: u8 = 18;

fn key(prefix: u8, segments: &[&[u8]]) -> Vec<u8> {
    let len = 1 + segments.iter().map(|segment| segment.len()).sum::<usize>();
    let mut key = Vec::with_capacity(len);
    key.push(prefix);
    for segment in segments {
        key.extend_from_slice(segment);
    }
    key
}

/// 64-bit bucket hash of an event type string.
///
/// Non-cryptographic; collisions merge buckets and are masked by the
/// post-decode type filter on reads.
pub fn event_type_hash(event_type: &str) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(event_type.as_bytes());
    hasher.finish()
}

/// Key of the first indexed height.
pub fn first() -> Vec<u8> {
    key(FIRST, &[])
}

/// Key of the last indexed height.
pub fn last() -> Vec<u8> {
    key(LAST, &[])
}

/// Key of the header at a height.
pub fn header(height: Height) -> Vec<u8> {
    key(HEADER, &[&height.to_be_bytes()])
}

/// Key of the state commitment at a height.
pub fn commit(height: Height) -> Vec<u8> {
    key(COMMIT, &[&height.to_be_bytes()])
}

/// Key of the event bucket for a type hash at a height.
pub fn events(height: Height, type_hash: u64) -> Vec<u8> {
    key(EVENTS, &[&height.to_be_bytes(), &type_hash.to_be_bytes()])
}

/// Prefix covering all event buckets at a height.
pub fn events_prefix(height: Height) -> Vec<u8> {
    key(EVENTS, &[&height.to_be_bytes()])
}

/// Byte offset of the type hash within an event key.
pub const EVENTS_TYPE_HASH_OFFSET: usize = 1 + 8;

/// Key of the payload written on a path at a height.
pub fn payload(path: &Path, height: Height) -> Vec<u8> {
    key(PAYLOAD, &[path, &height.to_be_bytes()])
}

/// Prefix covering all payload versions of a path.
pub fn payload_prefix(path: &Path) -> Vec<u8> {
    key(PAYLOAD, &[path])
}

/// Key of the height mapping for a block id.
pub fn height_for_block(block_id: &BlockId) -> Vec<u8> {
    key(HEIGHT_FOR_BLOCK, &[block_id])
}

/// Key of the height mapping for a state commitment.
pub fn height_for_commit(commit: &Commit) -> Vec<u8> {
    key(HEIGHT_FOR_COMMIT, &[commit])
}

/// Key of a transaction record.
pub fn transaction(transaction_id: &TransactionId) -> Vec<u8> {
    key(TRANSACTION, &[transaction_id])
}

/// Key of the height mapping for a transaction id.
pub fn height_for_transaction(transaction_id: &TransactionId) -> Vec<u8> {
    key(HEIGHT_FOR_TRANSACTION, &[transaction_id])
}

/// Key of the transaction-id list at a height.
pub fn transactions_for_height(height: Height) -> Vec<u8> {
    key(TRANSACTIONS_FOR_HEIGHT, &[&height.to_be_bytes()])
}

/// Key of a collection record.
pub fn collection(collection_id: &CollectionId) -> Vec<u8> {
    key(COLLECTION, &[collection_id])
}

/// Key of the transaction-id list of a collection.
pub fn transactions_for_collection(collection_id: &CollectionId) -> Vec<u8> {
    key(TRANSACTIONS_FOR_COLLECTION, &[collection_id])
}

/// Key of the collection-id list at a height.
pub fn collections_for_height(height: Height) -> Vec<u8> {
    key(COLLECTIONS_FOR_HEIGHT, &[&height.to_be_bytes()])
}

/// Key of a guarantee record, by guaranteed collection.
pub fn guarantee(collection_id: &CollectionId) -> Vec<u8> {
    key(GUARANTEE, &[collection_id])
}

/// Key of a seal record.
pub fn seal(seal_id: &SealId) -> Vec<u8> {
    key(SEAL, &[seal_id])
}

/// Key of the seal-id list at a height.
pub fn seals_for_height(height: Height) -> Vec<u8> {
    key(SEALS_FOR_HEIGHT, &[&height.to_be_bytes()])
}

/// Key of a transaction result, by executed transaction.
pub fn result(transaction_id: &TransactionId) -> Vec<u8> {
    key(RESULT, &[transaction_id])
}
