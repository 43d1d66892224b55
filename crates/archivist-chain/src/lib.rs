//! # archivist-chain
//!
//! Upstream interfaces of the indexing engine.
//!
//! This crate provides:
//! - `Chain`: the pull API for finalized protocol data at a height
//! - `Feeder`: the pull API for execution-state trie updates
//! - Bounded-queue implementations of both, which upstream followers push
//!   into and the state machine polls
//!
//! Both traits signal `IndexError::Unavailable` when a record has not
//! arrived yet; the state machine sleeps and retries on that variant.

mod chain;
mod feeder;

pub use chain::{BlockData, Chain, QueueChain};
pub use feeder::{Feeder, QueueFeeder};
