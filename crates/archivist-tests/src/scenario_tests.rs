//! End-to-end pipeline scenarios.
//!
//! Each test drives the full engine: queue-backed chain source and feeder,
//! the indexing state machine, the write buffer, and the read path over
//! the resulting store.

use crate::generators::*;
use crate::harness::*;

use archivist_mapper::Config as MapperConfig;
use archivist_state::Trie;
use archivist_types::IndexError;

// ============================================================================
// S1: Single-block bootstrap
// ============================================================================

#[tokio::test]
async fn test_single_block_bootstrap() {
    let p1 = path(1);
    let p2 = path(2);
    let root_trie = Trie::empty()
        .with_updates(&[p1, p2], &[payload(b"v1"), payload(b"v2")])
        .unwrap();
    let root_hash = root_trie.root_hash();

    let cfg = MapperConfig {
        root_trie: Some(root_trie),
        ..test_config()
    };
    let engine = TestEngine::start(cfg, 100);
    engine.push_block(block(100, root_hash)).await;
    engine.settle().await;

    let (_tmp, _db, reader, result) = engine.stop().await;
    result.unwrap();

    assert_eq!(reader.first().unwrap(), 100);
    assert_eq!(reader.last().unwrap(), 100);
    assert_eq!(reader.commit(100).unwrap(), root_hash);

    let values = reader.registers(100, &[p1, p2]).unwrap();
    assert_eq!(values.len(), 2);
    assert_eq!(values[0].as_ref().unwrap().value, b"v1");
    assert_eq!(values[1].as_ref().unwrap().value, b"v2");

    // The block-id mapping points back at the indexed height.
    let block_id = reader.header(100).unwrap().id().unwrap();
    assert_eq!(reader.height_for_block(&block_id).unwrap(), 100);
}

// ============================================================================
// S2: One trie update per block
// ============================================================================

#[tokio::test]
async fn test_one_update_per_block() {
    let p1 = path(1);
    let p2 = path(2);
    let root_trie = Trie::empty()
        .with_updates(&[p1, p2], &[payload(b"v1"), payload(b"v2")])
        .unwrap();
    let root_hash = root_trie.root_hash();
    let updated_trie = root_trie.with_updates(&[p1], &[payload(b"v1'")]).unwrap();
    let new_hash = updated_trie.root_hash();

    let cfg = MapperConfig {
        root_trie: Some(root_trie),
        ..test_config()
    };
    let engine = TestEngine::start(cfg, 100);
    engine.push_block(block(100, root_hash)).await;
    engine.push_block(block(101, new_hash)).await;
    engine
        .push_update(raw_update(root_hash, &[(p1, payload(b"v1'"))]))
        .await;
    engine.settle().await;

    let (_tmp, _db, reader, result) = engine.stop().await;
    result.unwrap();

    assert_eq!(reader.last().unwrap(), 101);
    assert_eq!(reader.commit(101).unwrap(), new_hash);

    let values = reader.registers(101, &[p1, p2]).unwrap();
    assert_eq!(values[0].as_ref().unwrap().value, b"v1'");
    assert_eq!(values[1].as_ref().unwrap().value, b"v2");

    // The previous height still serves the old value.
    let values = reader.registers(100, &[p1]).unwrap();
    assert_eq!(values[0].as_ref().unwrap().value, b"v1");
}

// ============================================================================
// S3: Multiple updates per block
// ============================================================================

#[tokio::test]
async fn test_multiple_updates_per_block() {
    let p1 = path(1);
    let p2 = path(2);
    let p3 = path(3);
    let root_trie = Trie::empty()
        .with_updates(&[p1, p2], &[payload(b"v1"), payload(b"v2")])
        .unwrap();
    let root_hash = root_trie.root_hash();
    let trie_101 = root_trie.with_updates(&[p1], &[payload(b"v1'")]).unwrap();
    let hash_101 = trie_101.root_hash();

    // Height 102 consists of two execution chunks.
    let chunk_one = trie_101.with_updates(&[p1], &[payload(b"v1''")]).unwrap();
    let hash_one = chunk_one.root_hash();
    let chunk_two = chunk_one
        .with_updates(&[p1, p3], &[payload(b"v1'''"), payload(b"v3")])
        .unwrap();
    let hash_two = chunk_two.root_hash();

    let cfg = MapperConfig {
        root_trie: Some(root_trie),
        ..test_config()
    };
    let engine = TestEngine::start(cfg, 100);
    engine.push_block(block(100, root_hash)).await;
    engine.push_block(block(101, hash_101)).await;
    engine.push_block(block(102, hash_two)).await;
    engine
        .push_update(raw_update(root_hash, &[(p1, payload(b"v1'"))]))
        .await;
    engine
        .push_update(raw_update(hash_101, &[(p1, payload(b"v1''"))]))
        .await;
    engine
        .push_update(raw_update(
            hash_one,
            &[(p1, payload(b"v1'''")), (p3, payload(b"v3"))],
        ))
        .await;
    engine.settle().await;

    let (_tmp, _db, reader, result) = engine.stop().await;
    result.unwrap();

    assert_eq!(reader.last().unwrap(), 102);

    // The latest update's value wins for p1.
    let values = reader.registers(102, &[p1, p2, p3]).unwrap();
    assert_eq!(values[0].as_ref().unwrap().value, b"v1'''");
    assert_eq!(values[1].as_ref().unwrap().value, b"v2");
    assert_eq!(values[2].as_ref().unwrap().value, b"v3");

    // p3 did not exist before height 102.
    let values = reader.registers(101, &[p3]).unwrap();
    assert!(values[0].is_none());
}

// ============================================================================
// S4: Pruned-branch update is discarded
// ============================================================================

#[tokio::test]
async fn test_pruned_branch_update_is_discarded() {
    let p1 = path(1);
    let root_trie = Trie::empty().with_updates(&[p1], &[payload(b"v1")]).unwrap();
    let root_hash = root_trie.root_hash();

    let cfg = MapperConfig {
        root_trie: Some(root_trie),
        ..test_config()
    };
    let engine = TestEngine::start(cfg, 100);
    engine.push_block(block(100, root_hash)).await;
    // An update rooted in a commit the forest never saw.
    engine
        .push_update(raw_update([0xAB; 32], &[(p1, payload(b"zzz"))]))
        .await;
    engine.settle().await;

    let (_tmp, _db, reader, result) = engine.stop().await;
    // The update is silently dropped: no error, no progress past 100.
    result.unwrap();
    assert_eq!(reader.last().unwrap(), 100);
    let values = reader.registers(100, &[p1]).unwrap();
    assert_eq!(values[0].as_ref().unwrap().value, b"v1");
}

// ============================================================================
// S5: Event filter
// ============================================================================

#[tokio::test]
async fn test_event_filter() {
    let root_trie = Trie::empty();
    let root_hash = root_trie.root_hash();

    let events = vec![
        event("A", 0),
        event("A", 1),
        event("B", 2),
        event("A", 3),
        event("B", 4),
    ];

    let cfg = MapperConfig {
        root_trie: Some(root_trie),
        ..test_config()
    };
    let engine = TestEngine::start(cfg, 100);
    engine
        .push_block(block_with_events(100, root_hash, events))
        .await;
    engine.settle().await;

    let (_tmp, _db, reader, result) = engine.stop().await;
    result.unwrap();

    let only_a = reader.events(100, &["A".to_string()]).unwrap();
    assert_eq!(only_a.len(), 3);
    assert!(only_a.iter().all(|event| event.event_type == "A"));
    let indices: Vec<u32> = only_a.iter().map(|event| event.event_index).collect();
    assert_eq!(indices, vec![0, 1, 3]);

    let both = reader
        .events(100, &["B".to_string(), "A".to_string()])
        .unwrap();
    assert_eq!(both.len(), 5);

    let all = reader.events(100, &[]).unwrap();
    assert_eq!(all.len(), 5);

    let none = reader.events(100, &["C".to_string()]).unwrap();
    assert!(none.is_empty());
}

// ============================================================================
// S6: Crash-restart consistency
// ============================================================================

#[tokio::test]
async fn test_crash_restart_consistency() {
    let p1 = path(1);
    let p2 = path(2);
    let root_trie = Trie::empty()
        .with_updates(&[p1, p2], &[payload(b"v1"), payload(b"v2")])
        .unwrap();
    let root_hash = root_trie.root_hash();

    // First run: complete height 100, then stall mid-way through 101. The
    // chain data of 101 is indexed, but without the trie update the height
    // never forwards, so `last` stays at 100.
    let cfg = MapperConfig {
        root_trie: Some(root_trie),
        ..test_config()
    };
    let engine = TestEngine::start(cfg, 100);
    engine.push_block(block(100, root_hash)).await;
    engine.push_block(block(101, [0x77; 32])).await;
    engine.settle().await;

    let (tmp, db, reader, result) = engine.stop().await;
    result.unwrap();
    assert_eq!(reader.last().unwrap(), 100);

    // Second run: resume without a root trie. The resumed forest is rooted
    // at the stored commitment of height 100; the update for 101 applies on
    // top of it.
    let resumed_trie = Trie::empty().with_updates(&[p1], &[payload(b"v1'")]).unwrap();
    let resumed_hash = resumed_trie.root_hash();

    let engine = TestEngine::start_on(tmp, db, test_config(), 100);
    engine.push_block(block(101, resumed_hash)).await;
    engine
        .push_update(raw_update(root_hash, &[(p1, payload(b"v1'"))]))
        .await;
    engine.settle().await;

    let (_tmp, _db, reader, result) = engine.stop().await;
    result.unwrap();

    assert_eq!(reader.first().unwrap(), 100);
    assert_eq!(reader.last().unwrap(), 101);

    let values = reader.registers(101, &[p1, p2]).unwrap();
    assert_eq!(values[0].as_ref().unwrap().value, b"v1'");
    assert_eq!(values[1].as_ref().unwrap().value, b"v2");
    let values = reader.registers(100, &[p1]).unwrap();
    assert_eq!(values[0].as_ref().unwrap().value, b"v1");
}

// ============================================================================
// Boundary: resume without a prior index
// ============================================================================

#[tokio::test]
async fn test_resume_without_prior_index_fails() {
    // No root trie, fresh database: nothing to resume from.
    let engine = TestEngine::start(test_config(), 100);
    engine.settle().await;

    let (_tmp, _db, _reader, result) = engine.stop().await;
    let err = result.unwrap_err();
    assert!(matches!(err, IndexError::SchemaMismatch(_)));
}
