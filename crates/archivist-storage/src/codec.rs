//! Canonical record codec with dictionary-trained compression.
//!
//! Values are encoded to canonical bytes and then zstd-compressed. Three
//! record families carry their own trained dictionary; everything else is
//! compressed without one. Compression and decompression are keyed by the
//! same [`RecordKind`], which the caller always knows statically from the
//! key prefix it is reading or writing, so every frame round-trips
//! bit-exactly. The codec is constructed once at engine start and shared by
//! reference; there is no process-wide state.

use std::io::Read;

use serde::{de::DeserializeOwned, Serialize};
use zstd::dict::{DecoderDictionary, EncoderDictionary};
use zstd::DEFAULT_COMPRESSION_LEVEL;

use archivist_types::encoding::{from_canonical_bytes, to_canonical_bytes};
use archivist_types::{IndexError, IndexResult};

use crate::dictionaries;

/// The record family a value belongs to, selecting its dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// Block header records.
    Header,
    /// Register payload records.
    Payload,
    /// Event batch records.
    Event,
    /// Everything else (heights, commits, id lists, ...).
    Other,
}

/// Shared encoder/decoder for all index values.
pub struct Codec {
    headers_enc: EncoderDictionary<'static>,
    payloads_enc: EncoderDictionary<'static>,
    events_enc: EncoderDictionary<'static>,
    headers_dec: DecoderDictionary<'static>,
    payloads_dec: DecoderDictionary<'static>,
    events_dec: DecoderDictionary<'static>,
}

impl Codec {
    /// Build the codec, loading the three embedded dictionaries.
    pub fn new() -> IndexResult<Self> {
        let headers = decode_dictionary(dictionaries::HEADERS, "headers")?;
        let payloads = decode_dictionary(dictionaries::PAYLOADS, "payloads")?;
        let events = decode_dictionary(dictionaries::EVENTS, "events")?;

        Ok(Self {
            headers_enc: EncoderDictionary::copy(&headers, DEFAULT_COMPRESSION_LEVEL),
            payloads_enc: EncoderDictionary::copy(&payloads, DEFAULT_COMPRESSION_LEVEL),
            events_enc: EncoderDictionary::copy(&events, DEFAULT_COMPRESSION_LEVEL),
            headers_dec: DecoderDictionary::copy(&headers),
            payloads_dec: DecoderDictionary::copy(&payloads),
            events_dec: DecoderDictionary::copy(&events),
        })
    }

    /// Encode a value to its compressed storage representation.
    pub fn encode<T: Serialize>(&self, kind: RecordKind, value: &T) -> IndexResult<Vec<u8>> {
        let data = to_canonical_bytes(value)?;
        self.compress(kind, &data)
    }

    /// Decode a value from its compressed storage representation.
    pub fn decode<T: DeserializeOwned>(&self, kind: RecordKind, data: &[u8]) -> IndexResult<T> {
        let data = self.decompress(kind, data)?;
        from_canonical_bytes(&data)
    }

    /// Compress raw bytes with the dictionary of the record kind.
    pub fn compress(&self, kind: RecordKind, data: &[u8]) -> IndexResult<Vec<u8>> {
        let compressed = match self.encoder_dictionary(kind) {
            Some(dictionary) => zstd::bulk::Compressor::with_prepared_dictionary(dictionary)
                .and_then(|mut compressor| compressor.compress(data)),
            None => zstd::bulk::compress(data, DEFAULT_COMPRESSION_LEVEL),
        };
        compressed
            .map_err(|err| IndexError::Internal(format!("could not compress value: {}", err)))
    }

    /// Decompress raw bytes with the dictionary of the record kind.
    pub fn decompress(&self, kind: RecordKind, data: &[u8]) -> IndexResult<Vec<u8>> {
        let mut out = Vec::new();
        let result = match self.decoder_dictionary(kind) {
            Some(dictionary) => {
                zstd::stream::read::Decoder::with_prepared_dictionary(data, dictionary)
                    .and_then(|mut decoder| decoder.read_to_end(&mut out))
            }
            None => zstd::stream::read::Decoder::new(data)
                .and_then(|mut decoder| decoder.read_to_end(&mut out)),
        };
        result.map_err(|err| {
            IndexError::SchemaMismatch(format!("could not decompress value: {}", err))
        })?;
        Ok(out)
    }

    fn encoder_dictionary(&self, kind: RecordKind) -> Option<&EncoderDictionary<'static>> {
        match kind {
            RecordKind::Header => Some(&self.headers_enc),
            RecordKind::Payload => Some(&self.payloads_enc),
            RecordKind::Event => Some(&self.events_enc),
            RecordKind::Other => None,
        }
    }

    fn decoder_dictionary(&self, kind: RecordKind) -> Option<&DecoderDictionary<'static>> {
        match kind {
            RecordKind::Header => Some(&self.headers_dec),
            RecordKind::Payload => Some(&self.payloads_dec),
            RecordKind::Event => Some(&self.events_dec),
            RecordKind::Other => None,
        }
    }
}

fn decode_dictionary(hex_blob: &str, name: &str) -> IndexResult<Vec<u8>> {
    hex::decode(hex_blob).map_err(|err| {
        IndexError::Internal(format!("could not decode {} dictionary: {}", name, err))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use archivist_types::{Event, Header, KeyPart, Payload};

    fn codec() -> Codec {
        Codec::new().unwrap()
    }

    #[test]
    fn test_header_round_trip() {
        let codec = codec();
        let header = Header {
            height: 100,
            parent_id: [1u8; 32],
            timestamp_ms: 1_700_000_000_000,
            payload_hash: [2u8; 32],
        };
        let data = codec.encode(RecordKind::Header, &header).unwrap();
        let decoded: Header = codec.decode(RecordKind::Header, &data).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_payload_round_trip() {
        let codec = codec();
        let payload = Payload::new(
            vec![KeyPart::new(0, b"owner".to_vec()), KeyPart::new(2, b"balance".to_vec())],
            b"\x00\x00\x00\x2A".to_vec(),
        );
        let data = codec.encode(RecordKind::Payload, &payload).unwrap();
        let decoded: Payload = codec.decode(RecordKind::Payload, &data).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_events_round_trip() {
        let codec = codec();
        let events = vec![
            Event {
                transaction_id: [3u8; 32],
                event_type: "token.Deposit".to_string(),
                event_index: 0,
                payload: b"amount=10".to_vec(),
            },
            Event {
                transaction_id: [3u8; 32],
                event_type: "token.Deposit".to_string(),
                event_index: 1,
                payload: b"amount=20".to_vec(),
            },
        ];
        let data = codec.encode(RecordKind::Event, &events).unwrap();
        let decoded: Vec<Event> = codec.decode(RecordKind::Event, &data).unwrap();
        assert_eq!(decoded, events);
    }

    #[test]
    fn test_other_round_trip() {
        let codec = codec();
        let data = codec.encode(RecordKind::Other, &42u64).unwrap();
        let decoded: u64 = codec.decode(RecordKind::Other, &data).unwrap();
        assert_eq!(decoded, 42);
    }

    #[test]
    fn test_garbage_frame_is_schema_mismatch() {
        let codec = codec();
        let err = codec
            .decode::<u64>(RecordKind::Other, &[0xDE, 0xAD, 0xBE, 0xEF])
            .unwrap_err();
        assert!(matches!(err, IndexError::SchemaMismatch(_)));
    }

    #[test]
    fn test_compression_is_deterministic() {
        let codec = codec();
        let payload = Payload::from_value(vec![0u8; 256]);
        assert_eq!(
            codec.encode(RecordKind::Payload, &payload).unwrap(),
            codec.encode(RecordKind::Payload, &payload).unwrap()
        );
    }
}
