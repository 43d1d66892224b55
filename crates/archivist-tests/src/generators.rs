//! Fixture generators for integration tests.

use rand::Rng;

use archivist_chain::BlockData;
use archivist_types::{
    Commit, Event, Header, Height, Path, Payload, RawTrieUpdate,
};

/// A ledger path with a recognizable first byte.
pub fn path(tag: u8) -> Path {
    let mut path = [0u8; 32];
    path[0] = tag;
    path
}

/// A register payload holding the given value bytes.
pub fn payload(value: &[u8]) -> Payload {
    Payload::from_value(value.to_vec())
}

/// A uniformly random ledger path.
pub fn random_path() -> Path {
    rand::thread_rng().gen()
}

/// A register payload with random value bytes of the given length.
pub fn random_payload(len: usize) -> Payload {
    let mut value = vec![0u8; len];
    rand::thread_rng().fill(value.as_mut_slice());
    Payload::from_value(value)
}

/// A header for the given height.
pub fn header(height: Height) -> Header {
    Header {
        height,
        parent_id: [0u8; 32],
        timestamp_ms: 1_600_000_000_000 + height * 1_000,
        payload_hash: [height as u8; 32],
    }
}

/// A block bundle with the given commitment and no chain records.
pub fn block(height: Height, commit: Commit) -> BlockData {
    BlockData {
        header: header(height),
        commit,
        guarantees: Vec::new(),
        seals: Vec::new(),
        collections: Vec::new(),
        transactions: Vec::new(),
        results: Vec::new(),
        events: Vec::new(),
    }
}

/// A block bundle carrying events.
pub fn block_with_events(height: Height, commit: Commit, events: Vec<Event>) -> BlockData {
    BlockData {
        events,
        ..block(height, commit)
    }
}

/// An event of the given type and index.
pub fn event(event_type: &str, index: u32) -> Event {
    Event {
        transaction_id: [0xEEu8; 32],
        event_type: event_type.to_string(),
        event_index: index,
        payload: index.to_be_bytes().to_vec(),
    }
}

/// A raw trie update as the feeder receives it from the execution stream.
pub fn raw_update(root: Commit, writes: &[(Path, Payload)]) -> RawTrieUpdate {
    RawTrieUpdate {
        root: root.to_vec(),
        paths: writes.iter().map(|(path, _)| path.to_vec()).collect(),
        payloads: writes.iter().map(|(_, payload)| payload.clone()).collect(),
    }
}
