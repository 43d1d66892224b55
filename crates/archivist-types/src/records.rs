//! Chain records produced by the protocol and execution streams.
//!
//! Record identifiers are content ids: Blake2b-256 over the record's
//! canonical encoding, so the same record always carries the same id no
//! matter where it was decoded.

use serde::{Deserialize, Serialize};

use crate::encoding::hash_of;
use crate::{
    BlockId, CollectionId, Commit, Digest32, Height, IndexResult, SealId, TransactionId,
};

/// Metadata of a finalized block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Height of the block.
    pub height: Height,
    /// Identifier of the parent block.
    pub parent_id: BlockId,
    /// Block proposal timestamp, milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    /// Digest of the block payload.
    pub payload_hash: Digest32,
}

impl Header {
    /// Content identifier of the header.
    pub fn id(&self) -> IndexResult<BlockId> {
        hash_of(self)
    }
}

/// A collector-node promise that a collection will be available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guarantee {
    /// Guaranteed collection.
    pub collection_id: CollectionId,
    /// Aggregated collector signature.
    pub signature: Vec<u8>,
}

/// A consensus attestation that an execution result is final.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seal {
    /// Sealed block.
    pub block_id: BlockId,
    /// Sealed execution result.
    pub result_id: Digest32,
    /// State commitment after executing the sealed block.
    pub commit: Commit,
}

impl Seal {
    /// Content identifier of the seal.
    pub fn id(&self) -> IndexResult<SealId> {
        hash_of(self)
    }
}

/// A batch of transactions proposed together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    /// Identifiers of the member transactions, in proposal order.
    pub transaction_ids: Vec<TransactionId>,
}

impl Collection {
    /// Content identifier of the collection.
    pub fn id(&self) -> IndexResult<CollectionId> {
        hash_of(self)
    }
}

/// A transaction submitted to the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Account paying for the transaction.
    pub payer: Vec<u8>,
    /// Payer sequence number.
    pub nonce: u64,
    /// Transaction script bytes.
    pub script: Vec<u8>,
    /// Encoded script arguments.
    pub arguments: Vec<Vec<u8>>,
    /// Block the transaction was pinned against.
    pub reference_block_id: BlockId,
}

impl Transaction {
    /// Content identifier of the transaction.
    pub fn id(&self) -> IndexResult<TransactionId> {
        hash_of(self)
    }
}

/// The outcome of executing a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionResult {
    /// Executed transaction.
    pub transaction_id: TransactionId,
    /// Failure message; empty on success.
    pub error_message: String,
}

impl TransactionResult {
    /// Whether the transaction executed without error.
    pub fn is_success(&self) -> bool {
        self.error_message.is_empty()
    }
}

/// An event emitted during transaction execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Emitting transaction.
    pub transaction_id: TransactionId,
    /// Fully qualified event type.
    pub event_type: String,
    /// Position of the event within its transaction.
    pub event_index: u32,
    /// Encoded event payload.
    pub payload: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Header {
        Header {
            height: 100,
            parent_id: [1u8; 32],
            timestamp_ms: 1_700_000_000_000,
            payload_hash: [2u8; 32],
        }
    }

    #[test]
    fn test_header_id_is_stable() {
        assert_eq!(header().id().unwrap(), header().id().unwrap());
    }

    #[test]
    fn test_header_id_depends_on_content() {
        let mut other = header();
        other.height += 1;
        assert_ne!(header().id().unwrap(), other.id().unwrap());
    }

    #[test]
    fn test_collection_id_depends_on_members() {
        let one = Collection {
            transaction_ids: vec![[1u8; 32]],
        };
        let two = Collection {
            transaction_ids: vec![[1u8; 32], [2u8; 32]],
        };
        assert_ne!(one.id().unwrap(), two.id().unwrap());
    }

    #[test]
    fn test_result_success() {
        let result = TransactionResult {
            transaction_id: [0u8; 32],
            error_message: String::new(),
        };
        assert!(result.is_success());

        let failed = TransactionResult {
            transaction_id: [0u8; 32],
            error_message: "abort".to_string(),
        };
        assert!(!failed.is_success());
    }
}
