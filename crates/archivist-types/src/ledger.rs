//! Ledger records: register payloads and trie updates.

use serde::{Deserialize, Serialize};

use crate::{digest_from_slice, Commit, IndexError, IndexResult, Path};

/// One part of a register key (owner, controller, key, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPart {
    /// Part kind discriminator.
    pub kind: u16,
    /// Part bytes.
    pub data: Vec<u8>,
}

impl KeyPart {
    /// Create a new key part.
    pub fn new(kind: u16, data: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            data: data.into(),
        }
    }
}

/// A register record: the key parts and the value stored at a ledger path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// Register key parts.
    pub key: Vec<KeyPart>,
    /// Register value bytes.
    pub value: Vec<u8>,
}

impl Payload {
    /// Create a payload from key parts and a value.
    pub fn new(key: Vec<KeyPart>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }

    /// Create a payload carrying only a value, with an empty key.
    pub fn from_value(value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: Vec::new(),
            value: value.into(),
        }
    }
}

/// A batch of register writes producing a new commit from a parent commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrieUpdate {
    /// Root hash of the trie the update applies to.
    pub root: Commit,
    /// Paths written by the update.
    pub paths: Vec<Path>,
    /// Payloads written, one per path.
    pub payloads: Vec<Payload>,
}

/// An unvalidated trie update as it arrives from the execution stream.
///
/// Digests are raw byte vectors here; [`TrieUpdate::try_from`] enforces the
/// fixed 32-byte width and the paths/payloads pairing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTrieUpdate {
    /// Root hash bytes of the parent trie.
    pub root: Vec<u8>,
    /// Written path bytes.
    pub paths: Vec<Vec<u8>>,
    /// Written payloads, one per path.
    pub payloads: Vec<Payload>,
}

impl TryFrom<RawTrieUpdate> for TrieUpdate {
    type Error = IndexError;

    fn try_from(raw: RawTrieUpdate) -> IndexResult<Self> {
        if raw.paths.len() != raw.payloads.len() {
            return Err(IndexError::SchemaMismatch(format!(
                "mismatched trie update: {} paths but {} payloads",
                raw.paths.len(),
                raw.payloads.len()
            )));
        }
        let root = digest_from_slice(&raw.root)?;
        let paths = raw
            .paths
            .iter()
            .map(|path| digest_from_slice(path))
            .collect::<IndexResult<Vec<Path>>>()?;

        Ok(TrieUpdate {
            root,
            paths,
            payloads: raw.payloads,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_update() -> RawTrieUpdate {
        RawTrieUpdate {
            root: vec![1u8; 32],
            paths: vec![vec![2u8; 32], vec![3u8; 32]],
            payloads: vec![Payload::from_value(b"a".to_vec()), Payload::from_value(b"b".to_vec())],
        }
    }

    #[test]
    fn test_valid_update_converts() {
        let update = TrieUpdate::try_from(raw_update()).unwrap();
        assert_eq!(update.root, [1u8; 32]);
        assert_eq!(update.paths.len(), 2);
        assert_eq!(update.payloads.len(), 2);
    }

    #[test]
    fn test_short_root_is_fatal() {
        let mut raw = raw_update();
        raw.root = vec![1u8; 16];
        let err = TrieUpdate::try_from(raw).unwrap_err();
        assert!(matches!(err, IndexError::SchemaMismatch(_)));
    }

    #[test]
    fn test_short_path_is_fatal() {
        let mut raw = raw_update();
        raw.paths[1] = vec![3u8; 31];
        let err = TrieUpdate::try_from(raw).unwrap_err();
        assert!(matches!(err, IndexError::SchemaMismatch(_)));
    }

    #[test]
    fn test_count_mismatch_is_fatal() {
        let mut raw = raw_update();
        raw.payloads.pop();
        let err = TrieUpdate::try_from(raw).unwrap_err();
        assert!(matches!(err, IndexError::SchemaMismatch(_)));
    }
}
