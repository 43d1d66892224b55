//! # archivist-state
//!
//! In-memory ledger state for the archivist index.
//!
//! This crate provides:
//! - `Trie`: an immutable, structurally shared state trie keyed by 32-byte
//!   ledger paths, with a canonical content-addressed root hash
//! - `Forest`: the DAG of trie snapshots accumulated between two finalized
//!   blocks, keyed by state commitment

mod forest;
mod trie;

pub use forest::Forest;
pub use trie::Trie;
