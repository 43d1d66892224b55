//! # archivist-types
//!
//! Shared domain types for the archivist index.
//!
//! This crate provides:
//! - 32-byte digest aliases (block ids, state commits, ledger paths)
//! - Chain records (headers, collections, transactions, seals, events)
//! - Ledger records (register payloads and trie updates)
//! - Canonical binary encoding helpers used for hashing and storage
//! - The unified error taxonomy of the indexing engine

mod error;
mod ledger;
mod records;

pub mod encoding;

pub use error::{IndexError, IndexResult};
pub use ledger::{KeyPart, Payload, RawTrieUpdate, TrieUpdate};
pub use records::{
    Collection, Event, Guarantee, Header, Seal, Transaction, TransactionResult,
};

/// Monotonic 64-bit ordinal of a finalized block.
pub type Height = u64;

/// 32-byte digest type alias.
pub type Digest32 = [u8; 32];

/// Block identifier (32-byte digest of the header).
pub type BlockId = Digest32;

/// State commitment (32-byte root hash of a ledger trie snapshot).
pub type Commit = Digest32;

/// Ledger path (32-byte key addressing a leaf in the state trie).
pub type Path = Digest32;

/// Collection identifier.
pub type CollectionId = Digest32;

/// Transaction identifier.
pub type TransactionId = Digest32;

/// Seal identifier.
pub type SealId = Digest32;

/// Sentinel parent commitment for the bootstrap snapshot chain.
///
/// The forest's first snapshot uses this as its parent so that the ancestor
/// walk during register collection has a well-defined stopping point before
/// any block has been indexed.
pub const DUMMY_COMMIT: Commit = [0u8; 32];

/// Byte length every digest in the system must have.
pub const DIGEST_LEN: usize = 32;

/// Parse a 32-byte digest from a byte slice.
///
/// Any other length is a fatal schema mismatch: upstream records carry
/// fixed-width hashes, and a shorter value means we are decoding garbage.
pub fn digest_from_slice(data: &[u8]) -> IndexResult<Digest32> {
    let digest: Digest32 = data.try_into().map_err(|_| {
        IndexError::SchemaMismatch(format!(
            "invalid digest length: got {} want {}",
            data.len(),
            DIGEST_LEN
        ))
    })?;
    Ok(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_from_slice_exact() {
        let bytes = [7u8; 32];
        assert_eq!(digest_from_slice(&bytes).unwrap(), bytes);
    }

    #[test]
    fn test_digest_from_slice_short() {
        let err = digest_from_slice(&[1u8; 31]).unwrap_err();
        assert!(matches!(err, IndexError::SchemaMismatch(_)));
    }

    #[test]
    fn test_digest_from_slice_long() {
        let err = digest_from_slice(&[1u8; 33]).unwrap_err();
        assert!(matches!(err, IndexError::SchemaMismatch(_)));
    }
}
