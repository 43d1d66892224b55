//! Canonical binary encoding and content hashing.
//!
//! All records are encoded with a fixed field order, fixed-width big-endian
//! integers and no map types, so the byte output is a deterministic function
//! of the value. Content identifiers are Blake2b-256 over that encoding.

use bincode::Options;
use blake2::{Blake2b, Digest};
use digest::consts::U32;
use serde::{de::DeserializeOwned, Serialize};

use crate::{Digest32, IndexError, IndexResult};

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_big_endian()
        .with_fixint_encoding()
}

/// Encode a value into its canonical byte representation.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> IndexResult<Vec<u8>> {
    options()
        .serialize(value)
        .map_err(|err| IndexError::Internal(format!("could not encode value: {}", err)))
}

/// Decode a value from its canonical byte representation.
pub fn from_canonical_bytes<T: DeserializeOwned>(data: &[u8]) -> IndexResult<T> {
    options()
        .deserialize(data)
        .map_err(|err| IndexError::SchemaMismatch(format!("could not decode value: {}", err)))
}

/// Blake2b-256 content identifier of a value's canonical encoding.
pub fn hash_of<T: Serialize>(value: &T) -> IndexResult<Digest32> {
    let data = to_canonical_bytes(value)?;
    Ok(hash_bytes(&data))
}

/// Blake2b-256 digest of raw bytes.
pub fn hash_bytes(data: &[u8]) -> Digest32 {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&result);
    digest
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        height: u64,
        id: [u8; 32],
        data: Vec<u8>,
    }

    #[test]
    fn test_round_trip() {
        let sample = Sample {
            height: 42,
            id: [9u8; 32],
            data: vec![1, 2, 3],
        };
        let bytes = to_canonical_bytes(&sample).unwrap();
        let decoded: Sample = from_canonical_bytes(&bytes).unwrap();
        assert_eq!(decoded, sample);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let sample = Sample {
            height: 7,
            id: [3u8; 32],
            data: vec![0xAA; 16],
        };
        assert_eq!(
            to_canonical_bytes(&sample).unwrap(),
            to_canonical_bytes(&sample).unwrap()
        );
    }

    #[test]
    fn test_integers_are_big_endian() {
        let bytes = to_canonical_bytes(&0x0102030405060708u64).unwrap();
        assert_eq!(bytes, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_decode_garbage_is_schema_mismatch() {
        let err = from_canonical_bytes::<Sample>(&[0xFF]).unwrap_err();
        assert!(matches!(err, IndexError::SchemaMismatch(_)));
    }

    #[test]
    fn test_hash_is_stable() {
        let sample = Sample {
            height: 1,
            id: [0u8; 32],
            data: vec![],
        };
        assert_eq!(hash_of(&sample).unwrap(), hash_of(&sample).unwrap());
    }
}
